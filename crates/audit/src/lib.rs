//! a11y-audit
//!
//! Runs accessibility audits against pages held open in a live WebDriver
//! session, applies an audit policy to each result, and collects every
//! result of a run into a single report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        AuditHarness                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SessionManager ── BrowserSession (WebDriverSession)        │
//! │    └── open(url), click, send_keys, quit                    │
//! │  AuditExecutor ── AuditEngine (AxeEngine)                   │
//! │    └── execute(session, request) -> AuditResult             │
//! │  AuditPolicy                                                │
//! │    └── evaluate(result, label) -> PolicyOutcome             │
//! │  Reporter                                                   │
//! │    ├── record(result, label)                                │
//! │    └── finalize_run(sink) -> JSONL sink + ReportRenderer    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  AuditPlan (YAML) ── PlanRunner                             │
//! │    steps: navigate | click | send_keys | sleep | audit      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod engine;
pub mod executor;
pub mod harness;
pub mod plan;
pub mod render;
pub mod reporter;
pub mod runner;
pub mod session;
pub mod webdriver;

pub use config::{AuditConfig, ReporterConfig, WebDriverConfig};
pub use driver::{DriverConfig, DriverService};
pub use engine::{AuditEngine, AxeEngine};
pub use executor::{AuditExecutor, DEFAULT_AUDIT_TIMEOUT};
pub use harness::AuditHarness;
pub use plan::{AuditPlan, AuditStep, PlanStep, Target};
pub use render::{CommandRenderer, RenderError, RenderWarning, ReportRenderer};
pub use reporter::{FinalizedRun, Reporter};
pub use runner::{PlanResult, PlanRunner, PlanSuiteResult, StepResult};
pub use session::{BrowserSession, ElementRef, Locator, SessionManager};
pub use webdriver::{Browser, WebDriverSession};

pub use a11y_common::{
    AccessibilityFailure, AuditPolicy, AuditRequest, AuditRequestBuilder, AuditResult, Error, PolicyOutcome,
    Result, Severity, Violation,
};
