//! Scripted in-memory page used by tests in place of a real browser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    BrowserError, BrowserLauncher, BrowserSession, ElementId, Locator, MENU_CONTROL_SELECTOR,
    TRACK_ROW_SELECTOR,
};

#[derive(Debug, Clone, Default)]
pub struct FakeRow {
    pub text: String,
    pub has_menu: bool,
    /// File written into the download directory when this row is downloaded
    pub download_file: Option<String>,
}

impl FakeRow {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            has_menu: true,
            download_file: None,
        }
    }

    pub fn track(position: usize, title: &str, artist: &str, duration: &str) -> Self {
        Self::text(&format!("{}\n{}\n{}\n{}", position, title, artist, duration))
    }

    pub fn with_file(mut self, name: &str) -> Self {
        self.download_file = Some(name.to_string());
        self
    }

    pub fn without_menu(mut self) -> Self {
        self.has_menu = false;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub rows: Vec<FakeRow>,
    /// Defaults to the row texts joined by newlines
    pub body_text: Option<String>,
    pub login_form: bool,
    pub redirect_after_login: Option<String>,
    /// Rows whose first text read fails with a stale element error
    pub stale_rows_once: Vec<usize>,
    pub fail_navigation: bool,
    pub option_hidden: bool,
}

#[derive(Debug, Default)]
struct State {
    page: FakePage,
    download_dir: Option<PathBuf>,
    current_url: String,
    visited: Vec<String>,
    typed: Vec<(String, String)>,
    logged_in: bool,
    open_menu: Option<usize>,
    downloaded_rows: Vec<usize>,
    stale_pending: HashSet<usize>,
    quit: bool,
}

#[derive(Debug, Clone)]
pub struct FakeSession {
    state: Arc<Mutex<State>>,
}

impl FakeSession {
    pub fn new(page: FakePage) -> Self {
        Self::with_download_dir(page, None)
    }

    pub fn with_download_dir(page: FakePage, download_dir: Option<PathBuf>) -> Self {
        let stale_pending = page.stale_rows_once.iter().copied().collect();
        Self {
            state: Arc::new(Mutex::new(State {
                page,
                download_dir,
                stale_pending,
                ..State::default()
            })),
        }
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn logged_in(&self) -> bool {
        self.state.lock().unwrap().logged_in
    }

    pub fn downloaded_rows(&self) -> Vec<usize> {
        self.state.lock().unwrap().downloaded_rows.clone()
    }

    pub fn download_dir(&self) -> Option<PathBuf> {
        self.state.lock().unwrap().download_dir.clone()
    }

    pub fn is_quit(&self) -> bool {
        self.state.lock().unwrap().quit
    }

    fn row_index(element: &ElementId, prefix: &str) -> Option<usize> {
        element.0.strip_prefix(prefix)?.parse().ok()
    }
}

impl State {
    fn form_visible(&self) -> bool {
        self.page.login_form && !self.logged_in
    }

    fn submit_login(&mut self) {
        self.logged_in = true;
        if let Some(redirect) = self.page.redirect_after_login.clone() {
            self.current_url = redirect;
        }
    }

    fn activate(&mut self, element: &ElementId) -> Result<(), BrowserError> {
        if let Some(index) = FakeSession::row_index(element, "menu-") {
            self.open_menu = Some(index);
            return Ok(());
        }
        match element.0.as_str() {
            "button-submit" => self.submit_login(),
            "body" => self.open_menu = None,
            "option" => {
                let Some(index) = self.open_menu.take() else {
                    return Err(BrowserError::NoSuchElement);
                };
                self.downloaded_rows.push(index);
                let file = self.page.rows[index].download_file.clone();
                if let (Some(dir), Some(file)) = (&self.download_dir, file) {
                    std::fs::write(dir.join(file), b"RIFF").map_err(|e| {
                        BrowserError::Protocol(format!("fake download failed: {}", e))
                    })?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if state.page.fail_navigation {
            return Err(BrowserError::WebDriver {
                error: "unknown error".to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        state.current_url = url.to_string();
        state.visited.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state.lock().unwrap().current_url.clone())
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementId>, BrowserError> {
        let state = self.state.lock().unwrap();
        let ids = match locator {
            Locator::Tag(tag) if tag == "body" => vec!["body".to_string()],
            Locator::Tag(tag) if tag == "input" && state.form_visible() => {
                vec!["input-user".to_string(), "input-pass".to_string()]
            }
            Locator::Tag(tag) if tag == "button" && state.form_visible() => {
                vec!["button-submit".to_string()]
            }
            Locator::Css(selector) if selector == TRACK_ROW_SELECTOR && !state.form_visible() => {
                (0..state.page.rows.len()).map(|i| format!("row-{}", i)).collect()
            }
            Locator::XPath(_) if state.open_menu.is_some() => vec!["option".to_string()],
            _ => Vec::new(),
        };
        Ok(ids.into_iter().map(ElementId).collect())
    }

    async fn find_elements_in(
        &self,
        parent: &ElementId,
        locator: &Locator,
    ) -> Result<Vec<ElementId>, BrowserError> {
        let state = self.state.lock().unwrap();
        let Some(index) = Self::row_index(parent, "row-") else {
            return Ok(Vec::new());
        };
        let is_menu_query = matches!(locator, Locator::Css(s) if s == MENU_CONTROL_SELECTOR);
        if is_menu_query && state.page.rows.get(index).is_some_and(|r| r.has_menu) {
            Ok(vec![ElementId(format!("menu-{}", index))])
        } else {
            Ok(Vec::new())
        }
    }

    async fn element_text(&self, element: &ElementId) -> Result<String, BrowserError> {
        let mut state = self.state.lock().unwrap();
        if let Some(index) = Self::row_index(element, "row-") {
            if state.stale_pending.remove(&index) {
                return Err(BrowserError::StaleElement);
            }
            return state
                .page
                .rows
                .get(index)
                .map(|row| row.text.clone())
                .ok_or(BrowserError::NoSuchElement);
        }
        match element.0.as_str() {
            "body" => Ok(state.page.body_text.clone().unwrap_or_else(|| {
                state
                    .page
                    .rows
                    .iter()
                    .map(|row| row.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })),
            "option" => Ok("Download WAV".to_string()),
            _ => Err(BrowserError::NoSuchElement),
        }
    }

    async fn attribute(
        &self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let value = match (element.0.as_str(), name) {
            ("input-user", "name") => Some("username"),
            ("input-user", "placeholder") => Some("Username"),
            ("input-pass", "name") => Some("password"),
            ("input-pass", "placeholder") => Some("Password"),
            ("button-submit", "type") => Some("submit"),
            _ => None,
        };
        Ok(value.map(str::to_string))
    }

    async fn is_displayed(&self, element: &ElementId) -> Result<bool, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(!(element.0 == "option" && state.page.option_hidden))
    }

    async fn click(&self, element: &ElementId) -> Result<(), BrowserError> {
        self.state.lock().unwrap().activate(element)
    }

    async fn clear(&self, _element: &ElementId) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if text == "\u{E007}" {
            state.submit_login();
        } else {
            state.typed.push((element.0.clone(), text.to_string()));
        }
        Ok(())
    }

    async fn scroll_into_view(&self, _element: &ElementId) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn script_click(&self, element: &ElementId) -> Result<(), BrowserError> {
        self.state.lock().unwrap().activate(element)
    }

    async fn quit(&self) -> Result<(), BrowserError> {
        self.state.lock().unwrap().quit = true;
        Ok(())
    }
}

/// Hands out `FakeSession`s over one page and keeps them for inspection.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    page: FakePage,
    sessions: Arc<Mutex<Vec<FakeSession>>>,
    pub fail_launch: bool,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn sessions(&self) -> Vec<FakeSession> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(
        &self,
        download_dir: Option<&Path>,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        if self.fail_launch {
            return Err(BrowserError::Protocol("session not created".to_string()));
        }
        let session =
            FakeSession::with_download_dir(self.page.clone(), download_dir.map(Path::to_path_buf));
        self.sessions.lock().unwrap().push(session.clone());
        Ok(Box::new(session))
    }
}
