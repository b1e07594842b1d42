//! Assertion-style audit flow over one session and one run

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use a11y_common::{AuditPolicy, AuditRequest, AuditRequestBuilder, PolicyOutcome, Result};

use crate::config::AuditConfig;
use crate::driver::{DriverConfig, DriverService};
use crate::engine::{AuditEngine, AxeEngine};
use crate::executor::AuditExecutor;
use crate::reporter::{FinalizedRun, Reporter};
use crate::session::{BrowserSession, SessionManager};
use crate::webdriver::WebDriverSession;

/// One session, one executor and one run report for a single logical flow
///
/// ```no_run
/// # use a11y_audit::{AuditConfig, AuditHarness};
/// # #[tokio::main]
/// # async fn main() -> a11y_common::Result<()> {
/// let config = AuditConfig::load(std::path::Path::new("a11y.toml"))?;
/// let mut harness = AuditHarness::launch(&config).await?;
/// harness.session_mut().open("https://dequeuniversity.com/demo/mars/").await?;
///
/// let request = harness.request().build()?;
/// let outcome = harness.audit("Mars Commuter", &request).await?;
/// assert!(!outcome.is_failure());
///
/// harness.finish().await?;
/// # Ok(())
/// # }
/// ```
pub struct AuditHarness {
    config: AuditConfig,
    session: SessionManager,
    executor: AuditExecutor,
    reporter: Reporter,
    driver: Option<DriverService>,
}

impl AuditHarness {
    /// Assemble a harness from parts
    pub fn new(config: AuditConfig, session: SessionManager, engine: Arc<dyn AuditEngine>) -> Self {
        let executor = AuditExecutor::new(engine).with_timeout(config.audit_timeout());
        let mut reporter = Reporter::new(config.suite_name.clone());
        if let Some(renderer) = config.renderer() {
            reporter = reporter.with_renderer(Box::new(renderer));
        }
        Self {
            config,
            session,
            executor,
            reporter,
            driver: None,
        }
    }

    /// Start (or attach to) a WebDriver server and open a browser session
    pub async fn launch(config: &AuditConfig) -> Result<Self> {
        let engine: Arc<dyn AuditEngine> = match &config.axe_script {
            Some(path) => Arc::new(AxeEngine::from_file(path)?),
            None => Arc::new(AxeEngine::preloaded()),
        };

        let (endpoint, driver) = match &config.webdriver.endpoint {
            Some(endpoint) => (endpoint.clone(), None),
            None => {
                let driver = DriverService::spawn(&DriverConfig::from(&config.webdriver)).await?;
                (driver.base_url().to_string(), Some(driver))
            }
        };

        let browser = WebDriverSession::connect(&endpoint, &config.webdriver).await?;
        let session = Self::prepare_session(Box::new(browser), config.audit_timeout()).await?;

        let mut harness = Self::new(config.clone(), session, engine);
        harness.driver = driver;
        Ok(harness)
    }

    /// Apply the script timeout to a fresh browser, quitting it if that fails
    pub async fn prepare_session(browser: Box<dyn BrowserSession>, audit_timeout: Duration) -> Result<SessionManager> {
        let mut session = SessionManager::new(browser);
        // Leave headroom so the executor's bound fires first
        if let Err(e) = session.set_script_timeout(audit_timeout + audit_timeout / 2).await {
            if let Err(quit) = session.quit().await {
                warn!("Could not quit browser after setup failure: {}", quit);
            }
            return Err(e);
        }
        Ok(session)
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager {
        &mut self.session
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut Reporter {
        &mut self.reporter
    }

    /// Builder seeded with the configured rule set
    pub fn request(&self) -> AuditRequestBuilder {
        self.config.request()
    }

    /// Audit, record under `state_label`, and judge with `policy`
    ///
    /// The result is recorded whatever the policy decides.
    pub async fn check(&mut self, state_label: &str, request: &AuditRequest, policy: AuditPolicy) -> Result<PolicyOutcome> {
        let result = self.executor.execute(&mut self.session, request).await?;
        let outcome = policy.evaluate(&result, state_label);
        self.reporter.record(result, state_label)?;
        Ok(outcome)
    }

    /// Audit for trend tracking; never reports a failure
    pub async fn audit(&mut self, state_label: &str, request: &AuditRequest) -> Result<PolicyOutcome> {
        self.check(state_label, request, AuditPolicy::AuditOnly).await
    }

    /// Audit and fail on any violation
    pub async fn assert_accessible(&mut self, state_label: &str, request: &AuditRequest) -> Result<PolicyOutcome> {
        self.check(state_label, request, AuditPolicy::enforcing()).await
    }

    /// Finalize the run into the configured output directory and close the browser
    pub async fn finish(mut self) -> Result<FinalizedRun> {
        let sink = self.reporter.sink_path(&self.config.output_dir);
        let finalized = self.reporter.finalize_run(&sink).await;
        let quit = self.session.quit().await;
        if let Some(mut driver) = self.driver.take() {
            driver.shutdown().await?;
        }

        let finalized = finalized?;
        quit?;
        info!("Audit run complete: {}", finalized.sink.display());
        Ok(finalized)
    }
}
