mod gmail;
mod link;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::MessageHandle;

pub use gmail::GmailClient;
pub use link::extract_download_link;

#[async_trait]
pub trait MailService: Send + Sync {
    async fn list_unread_from(&self, sender: &str) -> Result<Vec<MessageHandle>>;

    /// Rendered HTML body, or `None` if the message has no HTML part.
    async fn fetch_body(&self, id: &str) -> Result<Option<String>>;

    /// Returns whether the message is now marked read.
    async fn mark_read(&self, id: &str) -> bool;
}
