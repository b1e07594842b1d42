//! W3C WebDriver client
//!
//! Only the handful of commands the audit flow needs: session lifecycle,
//! navigation, script execution and basic element interaction.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace};

use a11y_common::{Error, Result};

use crate::config::WebDriverConfig;
use crate::session::{BrowserSession, ElementRef, Locator};

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Browser to request from the WebDriver server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chrome,
    Firefox,
    Edge,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Edge => "MicrosoftEdge",
        }
    }

    /// Capabilities payload for a new session
    pub fn capabilities(&self, headless: bool, extra_args: &[String]) -> Value {
        let mut args: Vec<String> = Vec::new();
        match self {
            Browser::Chrome | Browser::Edge => {
                if headless {
                    args.push("--headless=new".to_string());
                }
            }
            Browser::Firefox => {
                if headless {
                    args.push("-headless".to_string());
                }
            }
        }
        args.extend(extra_args.iter().map(|a| normalize_arg(*self, a)));

        let options_key = match self {
            Browser::Chrome => "goog:chromeOptions",
            Browser::Firefox => "moz:firefoxOptions",
            Browser::Edge => "ms:edgeOptions",
        };

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": self.as_str(),
                    options_key: { "args": args },
                }
            }
        })
    }
}

/// Accept both `disable-gpu` and `--disable-gpu` style arguments
fn normalize_arg(browser: Browser, arg: &str) -> String {
    if arg.starts_with('-') {
        return arg.to_string();
    }
    match browser {
        Browser::Firefox => format!("-{}", arg),
        _ => format!("--{}", arg),
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Session on a remote WebDriver server
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    connected: AtomicBool,
}

impl WebDriverSession {
    /// Create a new browser session on the server at `endpoint`
    pub async fn connect(endpoint: &str, config: &WebDriverConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::SessionUnavailable(format!("cannot build HTTP client: {}", e)))?;
        let base_url = endpoint.trim_end_matches('/').to_string();

        let body = config.browser.capabilities(config.headless, &config.args);
        let resp = client
            .post(format!("{}/session", base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::SessionUnavailable(format!("cannot reach {}: {}", base_url, e)))?;
        let value = decode(resp).await.map_err(|e| match e {
            Error::Driver(msg) => Error::SessionUnavailable(format!("session not created: {}", msg)),
            other => other,
        })?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SessionUnavailable("new session response has no sessionId".to_string()))?
            .to_string();

        info!("Started {:?} session {} on {}", config.browser, session_id, base_url);

        Ok(Self {
            client,
            base_url,
            session_id,
            connected: AtomicBool::new(true),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = if path.is_empty() {
            format!("{}/session/{}", self.base_url, self.session_id)
        } else {
            format!("{}/session/{}/{}", self.base_url, self.session_id, path)
        };
        trace!("WebDriver {} {}", method, url);

        let mut req = self.client.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(Error::SessionUnavailable(format!("lost connection to WebDriver: {}", e)));
            }
        };

        let result = decode(resp).await;
        if let Err(Error::SessionUnavailable(_)) = &result {
            self.connected.store(false, Ordering::SeqCst);
        }
        result
    }
}

/// Unwrap a WebDriver response envelope, classifying protocol errors
async fn decode(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body: WireResponse = resp
        .json()
        .await
        .map_err(|e| Error::Driver(format!("malformed WebDriver response ({}): {}", status, e)))?;

    if status.is_success() {
        return Ok(body.value);
    }

    let err: WireError = serde_json::from_value(body.value)
        .map_err(|_| Error::Driver(format!("WebDriver returned {}", status)))?;
    debug!("WebDriver error {}: {}", err.error, err.message);

    Err(classify(&err.error, &err.message))
}

fn classify(code: &str, message: &str) -> Error {
    let detail = format!("{}: {}", code, message);
    match code {
        "invalid session id" | "no such window" | "session not created" => Error::SessionUnavailable(detail),
        "javascript error" | "script timeout" | "unexpected alert open" => Error::AuditEngine(detail),
        _ => Error::Driver(detail),
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.command(Method::POST, "url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.command(Method::GET, "url", None).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| Error::Driver("current URL is not a string".to_string()))
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.command(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn execute_async_script(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.command(
            Method::POST,
            "execute/async",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn find_element(&self, locator: &Locator) -> Result<ElementRef> {
        let (using, value) = locator.strategy();
        let found = self
            .command(Method::POST, "element", Some(json!({ "using": using, "value": value })))
            .await?;
        found
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
            .ok_or_else(|| Error::Driver(format!("no element reference for {}", locator)))
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.command(Method::POST, &format!("element/{}/click", element.0), Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.command(
            Method::POST,
            &format!("element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn set_script_timeout(&self, timeout: Duration) -> Result<()> {
        self.command(Method::POST, "timeouts", Some(json!({ "script": timeout.as_millis() as u64 })))
            .await
            .map(|_| ())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn quit(&mut self) -> Result<()> {
        let result = self.command(Method::DELETE, "", None).await.map(|_| ());
        self.connected.store(false, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_chrome_headless_capabilities() {
        let caps = Browser::Chrome.capabilities(true, &["disable-gpu".to_string()]);
        let always = &caps["capabilities"]["alwaysMatch"];
        assert_eq!(always["browserName"], "chrome");
        let args = always["goog:chromeOptions"]["args"].as_array().unwrap();
        assert_eq!(args[0], "--headless=new");
        assert_eq!(args[1], "--disable-gpu");
    }

    #[test]
    fn test_firefox_args_use_single_dash() {
        let caps = Browser::Firefox.capabilities(false, &["private".to_string()]);
        let args = &caps["capabilities"]["alwaysMatch"]["moz:firefoxOptions"]["args"];
        assert_eq!(args[0], "-private");
    }

    #[test_case("invalid session id" => "session"; "invalid session")]
    #[test_case("no such window" => "session"; "window closed")]
    #[test_case("javascript error" => "engine"; "script error")]
    #[test_case("script timeout" => "engine"; "script timeout")]
    #[test_case("no such element" => "driver"; "missing element")]
    fn test_error_classification(code: &str) -> &'static str {
        match classify(code, "detail") {
            Error::SessionUnavailable(_) => "session",
            Error::AuditEngine(_) => "engine",
            Error::Driver(_) => "driver",
            other => panic!("unexpected {:?}", other),
        }
    }
}
