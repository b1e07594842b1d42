//! Bounded execution of one audit request against the current page

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use a11y_common::{AuditRequest, AuditResult, Error, Result};

use crate::engine::AuditEngine;
use crate::session::SessionManager;

/// Default upper bound on a single audit
pub const DEFAULT_AUDIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs audit requests through an engine, one at a time per session
#[derive(Clone)]
pub struct AuditExecutor {
    engine: Arc<dyn AuditEngine>,
    timeout: Duration,
}

impl AuditExecutor {
    pub fn new(engine: Arc<dyn AuditEngine>) -> Self {
        Self {
            engine,
            timeout: DEFAULT_AUDIT_TIMEOUT,
        }
    }

    /// Sets a custom bound for each audit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Audit the page currently loaded in `session`
    ///
    /// Taking the session mutably keeps at most one audit outstanding per
    /// session. On timeout the engine call is abandoned and the session is
    /// left open for its owner to tear down.
    pub async fn execute(&self, session: &mut SessionManager, request: &AuditRequest) -> Result<AuditResult> {
        let browser = session.auditable()?;
        let fallback_url = session.last_opened().unwrap_or_default().to_string();
        let start = Instant::now();

        let audit = async {
            let url = match browser.current_url().await {
                Ok(url) => url,
                Err(e) if e.is_session_lost() => return Err(e),
                Err(e) => {
                    warn!("Could not read current URL: {}", e);
                    fallback_url.clone()
                }
            };
            debug!("Auditing {} with {} ({:?})", url, self.engine.name(), request);
            let found = self.engine.run(browser, request).await.map_err(into_engine_error)?;
            Ok::<_, Error>((url, found))
        };

        let (url, found) = match tokio::time::timeout(self.timeout, audit).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!("Audit of {} exceeded {:?}", fallback_url, self.timeout);
                return Err(Error::AuditTimeout(self.timeout));
            }
        };

        // Rule lists apply even when the engine ignored its options
        let total = found.len();
        let violations: Vec<_> = found.into_iter().filter(|v| request.admits(&v.rule_id)).collect();
        if violations.len() != total {
            debug!("Dropped {} violation(s) outside the requested rules", total - violations.len());
        }

        info!(
            "Audited {} in {} ms: {} violation(s)",
            url,
            start.elapsed().as_millis(),
            violations.len()
        );
        Ok(AuditResult::new(url, violations))
    }
}

/// Session loss passes through; everything else the engine raises is an engine error
fn into_engine_error(e: Error) -> Error {
    match e {
        Error::SessionUnavailable(_) | Error::AuditEngine(_) | Error::AuditTimeout(_) => e,
        other => Error::AuditEngine(other.to_string()),
    }
}
