//! In-memory browser and engine used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use a11y_audit::{AuditConfig, AuditEngine, AuditHarness, BrowserSession, ElementRef, Locator, SessionManager};
use a11y_common::{AuditRequest, Error, Result, Severity, Violation};

pub const INDEX_URL: &str = "file:///src/main/webapp/index.html";

/// What the fake browser has seen and how it should behave
#[derive(Debug, Default)]
pub struct BrowserState {
    pub url: Option<String>,
    pub connected: bool,
    pub axe_loaded: bool,
    /// Value handed back by the async axe run script
    pub axe_response: Value,
    pub scripts: Vec<String>,
    pub async_args: Vec<Vec<Value>>,
    pub clicks: Vec<String>,
    pub keys: Vec<(String, String)>,
    pub quits: usize,
    pub script_timeout: Option<Duration>,
    /// Reject script timeout changes as an unknown command
    pub reject_timeouts: bool,
}

#[derive(Clone)]
pub struct FakeBrowser {
    pub state: Arc<Mutex<BrowserState>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrowserState {
                connected: true,
                axe_response: json!({ "ok": true, "violations": [] }),
                ..Default::default()
            })),
        }
    }

    pub fn disconnect(&self) {
        self.state.lock().unwrap().connected = false;
    }

    pub fn manager(&self) -> SessionManager {
        SessionManager::new(Box::new(self.clone()))
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.state.lock().unwrap().url = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        if !state.connected {
            return Err(Error::SessionUnavailable("invalid session id".to_string()));
        }
        Ok(state.url.clone().unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn execute_script(&self, script: &str, _args: Vec<Value>) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.scripts.push(script.to_string());
        if script.contains("typeof window.axe") {
            return Ok(Value::Bool(state.axe_loaded));
        }
        if script.contains("axe-core") {
            state.axe_loaded = true;
        }
        Ok(Value::Null)
    }

    async fn execute_async_script(&self, _script: &str, args: Vec<Value>) -> Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.async_args.push(args);
        Ok(state.axe_response.clone())
    }

    async fn find_element(&self, locator: &Locator) -> Result<ElementRef> {
        Ok(ElementRef(locator.to_string()))
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.state.lock().unwrap().clicks.push(element.0.clone());
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .keys
            .push((element.0.clone(), text.to_string()));
        Ok(())
    }

    async fn set_script_timeout(&self, timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.reject_timeouts {
            return Err(Error::Driver("unknown command: timeouts".to_string()));
        }
        state.script_timeout = Some(timeout);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn quit(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.quits += 1;
        state.connected = false;
        Ok(())
    }
}

/// How the fake engine answers a run
#[derive(Debug, Clone)]
pub enum EngineBehavior {
    Report(Vec<Violation>),
    /// Never completes
    Hang,
    /// Fails with a driver-level error
    Fail(String),
}

pub struct FakeEngine {
    behavior: EngineBehavior,
    pub requests: Mutex<Vec<AuditRequest>>,
}

impl FakeEngine {
    pub fn reporting(violations: Vec<Violation>) -> Arc<Self> {
        Arc::new(Self {
            behavior: EngineBehavior::Report(violations),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with(behavior: EngineBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn last_request(&self) -> Option<AuditRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AuditEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run(&self, _session: &dyn BrowserSession, request: &AuditRequest) -> Result<Vec<Violation>> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.behavior {
            EngineBehavior::Report(violations) => Ok(violations.clone()),
            EngineBehavior::Hang => std::future::pending().await,
            EngineBehavior::Fail(msg) => Err(Error::Driver(msg.clone())),
        }
    }
}

/// Violations typical of the sample homepage
pub fn homepage_violations() -> Vec<Violation> {
    vec![
        Violation::new("color-contrast", Severity::Serious, "Elements must have sufficient color contrast")
            .with_nodes([".panel .muted"]),
        Violation::new("label", Severity::Critical, "Form elements must have labels").with_nodes([".panel input"]),
        Violation::new("region", Severity::Moderate, "All page content should be contained by landmarks")
            .with_nodes(["footer"]),
    ]
}

pub fn harness_with(engine: Arc<dyn AuditEngine>, config: AuditConfig) -> (AuditHarness, FakeBrowser) {
    let browser = FakeBrowser::new();
    let harness = AuditHarness::new(config, browser.manager(), engine);
    (harness, browser)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("a11y_audit=debug")
        .try_init();
}
