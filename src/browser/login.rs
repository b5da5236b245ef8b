use std::time::Duration;

use super::{BrowserError, BrowserSession, ElementId, Locator};
use crate::config::PortalCredentials;

/// WebDriver key code for Enter.
const ENTER_KEY: &str = "\u{E007}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    NoLoginForm,
    Submitted,
    Failed,
}

/// Fill and submit a login form if the page shows one, then make sure we are
/// back on `target_url`. Never fails: problems are logged and reported as
/// `LoginOutcome::Failed` so the caller can still try to use the page.
pub async fn authenticate(
    session: &dyn BrowserSession,
    target_url: &str,
    credentials: &PortalCredentials,
    settle: Duration,
) -> LoginOutcome {
    match try_login(session, target_url, credentials, settle).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::debug!("Login attempt failed: {}", e);
            LoginOutcome::Failed
        }
    }
}

async fn try_login(
    session: &dyn BrowserSession,
    target_url: &str,
    credentials: &PortalCredentials,
    settle: Duration,
) -> Result<LoginOutcome, BrowserError> {
    let Some((user_input, pass_input)) = find_login_fields(session).await? else {
        return Ok(LoginOutcome::NoLoginForm);
    };

    if !session.is_displayed(&user_input).await? {
        return Ok(LoginOutcome::NoLoginForm);
    }

    tracing::info!("Logging in...");
    session.clear(&user_input).await?;
    session.send_keys(&user_input, &credentials.username).await?;
    session.clear(&pass_input).await?;
    session.send_keys(&pass_input, &credentials.password).await?;
    tokio::time::sleep(settle.min(Duration::from_secs(1))).await;

    if !click_submit_button(session).await? {
        session.send_keys(&pass_input, ENTER_KEY).await?;
    }
    tokio::time::sleep(settle).await;

    // Portals like to land on a dashboard after login
    let current = session.current_url().await?;
    if current != target_url {
        tracing::debug!("Login redirected to {}, returning to {}", current, target_url);
        session.navigate(target_url).await?;
        tokio::time::sleep(settle).await;
    }

    Ok(LoginOutcome::Submitted)
}

async fn find_login_fields(
    session: &dyn BrowserSession,
) -> Result<Option<(ElementId, ElementId)>, BrowserError> {
    let mut user_input = None;
    let mut pass_input = None;

    for input in session.find_elements(&Locator::tag("input")).await? {
        let placeholder = session
            .attribute(&input, "placeholder")
            .await?
            .unwrap_or_default()
            .to_lowercase();
        let name = session
            .attribute(&input, "name")
            .await?
            .unwrap_or_default()
            .to_lowercase();

        if placeholder.contains("user") || name.contains("user") {
            user_input = Some(input.clone());
        }
        if placeholder.contains("pass") || name.contains("pass") {
            pass_input = Some(input);
        }
    }

    Ok(user_input.zip(pass_input))
}

async fn click_submit_button(session: &dyn BrowserSession) -> Result<bool, BrowserError> {
    for button in session.find_elements(&Locator::tag("button")).await? {
        let is_submit = session.attribute(&button, "type").await?.as_deref() == Some("submit");
        if is_submit && session.is_displayed(&button).await? {
            session.click(&button).await?;
            return Ok(true);
        }
    }
    Ok(false)
}
