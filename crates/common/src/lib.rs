//! a11y-audit Common Library
//!
//! Browser-independent pieces of the audit pipeline: request composition,
//! violation and result types, audit policies, and the run report format.

pub mod error;
pub mod policy;
pub mod report;
pub mod request;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use policy::{AccessibilityFailure, AuditPolicy, PolicyOutcome};
pub use report::{ReportRecord, RunReport};
pub use request::{AuditRequest, AuditRequestBuilder};
pub use types::{AuditResult, Severity, Violation};

/// a11y-audit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
