use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::MailService;
use crate::error::{AppError, Result};
use crate::models::MessageHandle;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FullMessage {
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest {
    remove_label_ids: Vec<String>,
}

/// Gmail REST client. Authentication happens elsewhere; we only carry the
/// bearer token.
pub struct GmailClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GmailClient {
    pub fn new(base_url: &str, access_token: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/gmail/v1/users/me/messages", self.base_url)
    }

    async fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<ListResponse> {
        let mut request = self
            .client
            .get(self.messages_url())
            .bearer_auth(&self.access_token)
            .query(&[("q", query)]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::GoogleApi(format!(
                "listing messages failed: {} {}",
                status, error_text
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_unread_from(&self, sender: &str) -> Result<Vec<MessageHandle>> {
        let query = format!("from:{} is:unread", sender);
        let mut handles = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(&query, page_token.as_deref()).await?;
            handles.extend(page.messages.into_iter().map(|m| MessageHandle::new(m.id)));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(handles)
    }

    async fn fetch_body(&self, id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/{}", self.messages_url(), id))
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("Failed to fetch message {}: {}", id, response.status());
            return Ok(None);
        }

        let message: FullMessage = response.json().await?;
        Ok(message.payload.as_ref().and_then(find_html_body))
    }

    async fn mark_read(&self, id: &str) -> bool {
        let request = ModifyRequest {
            remove_label_ids: vec!["UNREAD".to_string()],
        };
        let result = self
            .client
            .post(format!("{}/{}/modify", self.messages_url(), id))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!("Failed to mark {} as read: {}", id, response.status());
                false
            }
            Err(e) => {
                tracing::warn!("Failed to mark {} as read: {}", id, e);
                false
            }
        }
    }
}

/// Depth-first search for the first decodable `text/html` part.
fn find_html_body(part: &MessagePart) -> Option<String> {
    if part.mime_type == "text/html" {
        let data = part.body.as_ref().and_then(|b| b.data.as_deref());
        if let Some(html) = data.and_then(decode_body) {
            return Some(html);
        }
    }
    part.parts.iter().find_map(find_html_body)
}

fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
