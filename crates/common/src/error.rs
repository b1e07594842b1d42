//! Error types for a11y-audit

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the audit Error
pub type Result<T> = std::result::Result<T, Error>;

/// Audit error types
///
/// Violations found by an enforcing audit are not errors; they are reported
/// through [`crate::policy::PolicyOutcome`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid audit configuration: {0}")]
    Configuration(String),

    #[error("Browser session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Audit engine error: {0}")]
    AuditEngine(String),

    #[error("Audit timed out after {0:?}")]
    AuditTimeout(Duration),

    #[error("Run already finalized; no further records accepted")]
    RunClosed,

    #[error("WebDriver command failed: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the browser session behind this error can no longer be used
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Error::SessionUnavailable(_))
    }
}
