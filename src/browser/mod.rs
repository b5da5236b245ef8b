//! Browser automation seam.
//!
//! Pipeline code talks to [`BrowserSession`] only. The production
//! implementation speaks W3C WebDriver; tests drive a scripted fake page.

mod login;
mod webdriver;

#[cfg(test)]
pub mod fake;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use login::{authenticate, LoginOutcome};
pub use webdriver::WebDriverLauncher;

/// Elements that may hold one track each.
pub const TRACK_ROW_SELECTOR: &str = "div[class*='row'], div[class*='track'], li, tr";

/// Candidates for the per-row overflow menu; the last match in a row wins.
pub const MENU_CONTROL_SELECTOR: &str = "button, svg, [role='button'], .cursor-pointer, i";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("stale element reference")]
    StaleElement,

    #[error("no such element")]
    NoSuchElement,

    #[error("webdriver error {error}: {message}")]
    WebDriver { error: String, message: String },

    #[error("webdriver transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected webdriver response: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
    Tag(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Locator::Tag(name.into())
    }

    pub fn track_rows() -> Self {
        Locator::css(TRACK_ROW_SELECTOR)
    }

    pub fn menu_controls() -> Self {
        Locator::css(MENU_CONTROL_SELECTOR)
    }

    /// Any menu entry (div, li or button) whose text contains `label`.
    pub fn menu_option(label: &str) -> Self {
        let literal = xpath_literal(label);
        Locator::xpath(format!(
            "//div[contains(., {literal})] | //li[contains(., {literal})] | //button[contains(., {literal})]"
        ))
    }
}

/// Quote a string for use inside an XPath expression.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Opaque handle to an element of the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementId>, BrowserError>;

    async fn find_elements_in(
        &self,
        parent: &ElementId,
        locator: &Locator,
    ) -> Result<Vec<ElementId>, BrowserError>;

    async fn element_text(&self, element: &ElementId) -> Result<String, BrowserError>;

    async fn attribute(
        &self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    async fn is_displayed(&self, element: &ElementId) -> Result<bool, BrowserError>;

    async fn click(&self, element: &ElementId) -> Result<(), BrowserError>;

    async fn clear(&self, element: &ElementId) -> Result<(), BrowserError>;

    async fn send_keys(&self, element: &ElementId, text: &str) -> Result<(), BrowserError>;

    async fn scroll_into_view(&self, element: &ElementId) -> Result<(), BrowserError>;

    /// Click through script, which works on elements covered by overlays.
    async fn script_click(&self, element: &ElementId) -> Result<(), BrowserError>;

    async fn quit(&self) -> Result<(), BrowserError>;

    /// Text of the whole `<body>`.
    async fn body_text(&self) -> Result<String, BrowserError> {
        let bodies = self.find_elements(&Locator::tag("body")).await?;
        match bodies.first() {
            Some(body) => self.element_text(body).await,
            None => Err(BrowserError::NoSuchElement),
        }
    }
}

/// Opens fresh browser sessions; one per discovery or download pass.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        download_dir: Option<&Path>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xpath_literal_handles_quotes() {
        assert_eq!(xpath_literal("Download WAV"), "'Download WAV'");
        assert_eq!(xpath_literal("Rock 'n' Roll"), "\"Rock 'n' Roll\"");
        assert_eq!(
            xpath_literal("it's \"x\""),
            "concat('it', \"'\", 's \"x\"')"
        );
    }

    #[test]
    fn menu_option_covers_div_li_and_button() {
        let Locator::XPath(expr) = Locator::menu_option("Download WAV") else {
            panic!("expected xpath locator");
        };
        assert!(expr.contains("//div[contains(., 'Download WAV')]"));
        assert!(expr.contains("//li[contains(., 'Download WAV')]"));
        assert!(expr.contains("//button[contains(., 'Download WAV')]"));
    }
}
