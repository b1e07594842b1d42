//! Browser session ownership and page navigation

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use a11y_common::{Error, Result};

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    Id(String),
    XPath(String),
    LinkText(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    /// WebDriver location strategy and value
    pub fn strategy(&self) -> (&'static str, String) {
        match self {
            Locator::Css(s) => ("css selector", s.clone()),
            // W3C WebDriver has no id strategy
            Locator::Id(id) => {
                let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
                ("css selector", format!("[id=\"{}\"]", escaped))
            }
            Locator::XPath(x) => ("xpath", x.clone()),
            Locator::LinkText(t) => ("link text", t.clone()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::Id(id) => write!(f, "id={}", id),
            Locator::XPath(x) => write!(f, "xpath={}", x),
            Locator::LinkText(t) => write!(f, "link={}", t),
        }
    }
}

/// Opaque handle to an element found in the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef(pub String);

/// Live browser context that can be navigated, scripted and inspected
///
/// Implemented by [`crate::webdriver::WebDriverSession`]; tests supply
/// in-memory implementations.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Run `script` as a function body; `arguments[i]` are `args`
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    /// Like `execute_script`, with a completion callback as the last argument
    async fn execute_async_script(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    async fn find_element(&self, locator: &Locator) -> Result<ElementRef>;

    async fn click(&self, element: &ElementRef) -> Result<()>;

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()>;

    /// Bound browser-side script execution (async scripts included)
    async fn set_script_timeout(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    /// Whether the remote end is still reachable
    fn is_connected(&self) -> bool;

    async fn quit(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    /// Connected, no page loaded yet
    Blank,
    Navigated(String),
    Closed,
}

/// Exclusive owner of one browser session for the duration of a flow
pub struct SessionManager {
    browser: Box<dyn BrowserSession>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(browser: Box<dyn BrowserSession>) -> Self {
        Self {
            browser,
            state: SessionState::Blank,
        }
    }

    /// Navigate to `url` and wait for the load to complete
    pub async fn open(&mut self, url: &str) -> Result<()> {
        self.ensure_open()?;
        info!("Opening {}", url);
        self.browser.navigate(url).await?;
        self.state = SessionState::Navigated(url.to_string());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// URL most recently opened through this manager
    pub fn last_opened(&self) -> Option<&str> {
        match &self.state {
            SessionState::Navigated(url) => Some(url),
            _ => None,
        }
    }

    /// Borrow the browser for a read-only audit
    ///
    /// Fails when the session was closed, never navigated, or lost its
    /// connection to the remote end.
    pub fn auditable(&self) -> Result<&dyn BrowserSession> {
        match &self.state {
            SessionState::Closed => Err(Error::SessionUnavailable("session was closed".to_string())),
            SessionState::Blank => Err(Error::SessionUnavailable(
                "no page has been opened in this session".to_string(),
            )),
            SessionState::Navigated(_) if !self.browser.is_connected() => Err(Error::SessionUnavailable(
                "browser is no longer connected".to_string(),
            )),
            SessionState::Navigated(_) => Ok(self.browser.as_ref()),
        }
    }

    pub async fn find_element(&self, locator: &Locator) -> Result<ElementRef> {
        self.ensure_open()?;
        debug!("Finding element {}", locator);
        self.browser.find_element(locator).await
    }

    pub async fn click(&self, locator: &Locator) -> Result<()> {
        let element = self.find_element(locator).await?;
        self.browser.click(&element).await
    }

    pub async fn send_keys(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.find_element(locator).await?;
        self.browser.send_keys(&element, text).await
    }

    pub async fn current_url(&self) -> Result<String> {
        self.ensure_open()?;
        self.browser.current_url().await
    }

    pub async fn set_script_timeout(&self, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        self.browser.set_script_timeout(timeout).await
    }

    /// End the browser session; calling again is a no-op
    pub async fn quit(&mut self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.state = SessionState::Closed;
        if let Err(e) = self.browser.quit().await {
            warn!("Browser quit failed: {}", e);
            return Err(e);
        }
        info!("Browser session closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionUnavailable("session was closed".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_locator_maps_to_css() {
        let (using, value) = Locator::id("route-type-multi-city").strategy();
        assert_eq!(using, "css selector");
        assert_eq!(value, "[id=\"route-type-multi-city\"]");
    }

    #[test]
    fn test_id_locator_escapes_backslash_and_quote() {
        let (_, value) = Locator::id(r#"a\b"c"#).strategy();
        assert_eq!(value, r#"[id="a\\b\"c"]"#);
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css(".panel").to_string(), "css=.panel");
        assert_eq!(Locator::XPath("//h1".to_string()).to_string(), "xpath=//h1");
    }
}
