//! Finding the tracks listed on a release page.

mod discoverer;
pub mod scan;

pub use discoverer::TrackDiscoverer;
