use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};

use super::{BrowserError, BrowserLauncher, BrowserSession, ElementId, Locator};
use crate::config::BrowserConfig;

/// W3C key under which element references are serialized.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const SCROLL_INTO_VIEW_SCRIPT: &str =
    "arguments[0].scrollIntoView({block: 'center', inline: 'nearest'});";
const CLICK_SCRIPT: &str = "arguments[0].click();";

/// Starts Chrome sessions on a running WebDriver server (e.g. chromedriver).
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    client: Client,
    settings: BrowserConfig,
}

impl WebDriverLauncher {
    pub fn new(settings: BrowserConfig) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, settings })
    }

    fn capabilities(&self, download_dir: Option<&Path>) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!(
                "--window-size={},{}",
                self.settings.window_width, self.settings.window_height
            ),
            format!("--user-agent={}", self.settings.user_agent),
        ];
        if self.settings.headless {
            args.push("--headless=new".to_string());
        }

        let mut chrome_options = json!({ "args": args });
        if let Some(dir) = download_dir {
            let dir = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
            // Download straight into the batch directory without prompting
            chrome_options["prefs"] = json!({
                "download.default_directory": dir.to_string_lossy(),
                "download.prompt_for_download": false,
                "download.directory_upgrade": true,
                "safebrowsing.enabled": true,
                "profile.default_content_settings.popups": 0,
                "profile.default_content_setting_values.automatic_downloads": 1,
            });
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": chrome_options,
                }
            }
        })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(
        &self,
        download_dir: Option<&Path>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let base = self.settings.webdriver_url.trim_end_matches('/');
        let response = self
            .client
            .post(format!("{}/session", base))
            .json(&self.capabilities(download_dir))
            .send()
            .await?;
        let value = unwrap_response(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol("missing sessionId".to_string()))?;
        tracing::debug!("Started webdriver session {}", session_id);

        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", base, session_id),
        }))
    }
}

pub struct WebDriverSession {
    client: Client,
    session_url: String,
}

impl WebDriverSession {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        let url = format!("{}{}", self.session_url, path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        } else if method == Method::POST {
            request = request.json(&json!({}));
        }
        let response = request.send().await?;
        unwrap_response(response).await
    }

    async fn execute(&self, script: &str, element: &ElementId) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [element_ref(element)] })),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let value = self.command(Method::GET, "/url", None).await?;
        as_string(value)
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementId>, BrowserError> {
        let value = self
            .command(Method::POST, "/elements", Some(locator_body(locator)))
            .await?;
        parse_elements(value)
    }

    async fn find_elements_in(
        &self,
        parent: &ElementId,
        locator: &Locator,
    ) -> Result<Vec<ElementId>, BrowserError> {
        let path = format!("/element/{}/elements", parent.0);
        let value = self
            .command(Method::POST, &path, Some(locator_body(locator)))
            .await?;
        parse_elements(value)
    }

    async fn element_text(&self, element: &ElementId) -> Result<String, BrowserError> {
        let path = format!("/element/{}/text", element.0);
        as_string(self.command(Method::GET, &path, None).await?)
    }

    async fn attribute(
        &self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let path = format!("/element/{}/attribute/{}", element.0, name);
        let value = self.command(Method::GET, &path, None).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn is_displayed(&self, element: &ElementId) -> Result<bool, BrowserError> {
        let path = format!("/element/{}/displayed", element.0);
        let value = self.command(Method::GET, &path, None).await?;
        value
            .as_bool()
            .ok_or_else(|| BrowserError::Protocol(format!("expected bool, got {}", value)))
    }

    async fn click(&self, element: &ElementId) -> Result<(), BrowserError> {
        let path = format!("/element/{}/click", element.0);
        self.command(Method::POST, &path, None).await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementId) -> Result<(), BrowserError> {
        let path = format!("/element/{}/clear", element.0);
        self.command(Method::POST, &path, None).await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> Result<(), BrowserError> {
        let path = format!("/element/{}/value", element.0);
        self.command(Method::POST, &path, Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementId) -> Result<(), BrowserError> {
        self.execute(SCROLL_INTO_VIEW_SCRIPT, element).await
    }

    async fn script_click(&self, element: &ElementId) -> Result<(), BrowserError> {
        self.execute(CLICK_SCRIPT, element).await
    }

    async fn quit(&self) -> Result<(), BrowserError> {
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

fn locator_body(locator: &Locator) -> Value {
    let (using, value) = match locator {
        Locator::Css(selector) => ("css selector", selector),
        Locator::XPath(expr) => ("xpath", expr),
        Locator::Tag(name) => ("tag name", name),
    };
    json!({ "using": using, "value": value })
}

fn element_ref(element: &ElementId) -> Value {
    json!({ ELEMENT_KEY: element.0 })
}

fn parse_elements(value: Value) -> Result<Vec<ElementId>, BrowserError> {
    let Value::Array(items) = value else {
        return Err(BrowserError::Protocol(format!(
            "expected element list, got {}",
            value
        )));
    };
    items
        .iter()
        .map(|item| {
            item.get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| ElementId(id.to_string()))
                .ok_or_else(|| BrowserError::Protocol(format!("bad element reference {}", item)))
        })
        .collect()
}

fn as_string(value: Value) -> Result<String, BrowserError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(BrowserError::Protocol(format!(
            "expected string, got {}",
            other
        ))),
    }
}

/// Unwrap the `value` member of a WebDriver response, mapping error payloads.
async fn unwrap_response(response: reqwest::Response) -> Result<Value, BrowserError> {
    let status = response.status();
    let mut body: Value = response.json().await?;
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Err(match error.as_str() {
        "stale element reference" => BrowserError::StaleElement,
        "no such element" => BrowserError::NoSuchElement,
        _ => BrowserError::WebDriver { error, message },
    })
}
