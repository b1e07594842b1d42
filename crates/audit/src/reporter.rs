//! Per-run result aggregation and finalization

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use a11y_common::{AuditResult, Error, ReportRecord, Result, RunReport};

use crate::render::{RenderWarning, ReportRenderer};

/// Outcome of finalizing a run
#[derive(Debug, Clone)]
pub struct FinalizedRun {
    /// Location of the raw report; always valid when this value exists
    pub sink: PathBuf,
    pub records: usize,
    pub warnings: Vec<RenderWarning>,
}

/// Exclusive owner of one run's report
///
/// Accepts records until [`Reporter::finalize_run`] succeeds; afterwards every
/// call fails with [`Error::RunClosed`].
pub struct Reporter {
    run_id: String,
    suite_name: String,
    report: RunReport,
    renderer: Option<Box<dyn ReportRenderer>>,
    closed: bool,
}

impl Reporter {
    pub fn new(suite_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            suite_name: suite_name.into(),
            report: RunReport::new(),
            renderer: None,
            closed: false,
        }
    }

    /// Render the sink with `renderer` once the run is finalized
    pub fn with_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    /// Suite name stamped on subsequent records
    pub fn set_suite_name(&mut self, suite_name: impl Into<String>) {
        self.suite_name = suite_name.into();
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Default sink location for this run under `output_dir`
    pub fn sink_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("a11y-{}.jsonl", self.run_id))
    }

    /// Append `result` under `state_label`
    pub fn record(&mut self, result: AuditResult, state_label: &str) -> Result<()> {
        if self.closed {
            return Err(Error::RunClosed);
        }
        info!(
            "Recorded '{}' ({} violation(s)) in suite '{}'",
            state_label,
            result.violations().len(),
            self.suite_name
        );
        self.report
            .push(ReportRecord::from_result(&self.suite_name, state_label, result));
        Ok(())
    }

    /// Write the full report to `sink`, then run the renderer if one is set
    ///
    /// Renderer failures are returned as warnings; the sink is written and
    /// persisted before the renderer starts.
    pub async fn finalize_run(&mut self, sink: &Path) -> Result<FinalizedRun> {
        if self.closed {
            return Err(Error::RunClosed);
        }

        self.report.write_sink(sink)?;
        self.closed = true;
        info!("Run {} finalized: {} record(s) written to {}", self.run_id, self.report.len(), sink.display());

        let mut warnings = Vec::new();
        if let Some(renderer) = &self.renderer {
            if let Err(e) = renderer.render(sink).await {
                let warning = RenderWarning {
                    renderer: renderer.name().to_string(),
                    sink: sink.to_path_buf(),
                    message: e.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }

        Ok(FinalizedRun {
            sink: sink.to_path_buf(),
            records: self.report.len(),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a11y_common::{Severity, Violation};

    fn result(rule: &str) -> AuditResult {
        AuditResult::new(
            "file:///src/main/webapp/index.html",
            vec![Violation::new(rule, Severity::Serious, "problem")],
        )
    }

    #[test]
    fn test_record_stamps_suite_and_label() {
        let mut reporter = Reporter::new("Homepage");
        reporter.record(result("label"), "Homepage All").unwrap();
        reporter.set_suite_name("Homepage Sections");
        reporter.record(result("region"), "Homepage section").unwrap();

        let records = reporter.report().records();
        assert_eq!(records[0].test_suite, "Homepage");
        assert_eq!(records[1].test_suite, "Homepage Sections");
        assert_eq!(records[1].state_label, "Homepage section");
    }

    #[test]
    fn test_sink_path_is_per_run() {
        let a = Reporter::new("x");
        let b = Reporter::new("x");
        let dir = Path::new("target/a11y-reports");
        assert_ne!(a.sink_path(dir), b.sink_path(dir));
        assert!(a.sink_path(dir).starts_with(dir));
    }

    #[tokio::test]
    async fn test_finalize_closes_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = Reporter::new("Homepage");
        reporter.record(result("label"), "Homepage All").unwrap();

        let sink = reporter.sink_path(dir.path());
        let finalized = reporter.finalize_run(&sink).await.unwrap();
        assert_eq!(finalized.records, 1);
        assert!(finalized.warnings.is_empty());
        assert!(reporter.is_closed());

        assert!(matches!(reporter.record(result("label"), "late"), Err(Error::RunClosed)));
        assert!(matches!(reporter.finalize_run(&sink).await, Err(Error::RunClosed)));
    }

    #[tokio::test]
    async fn test_failed_sink_write_leaves_run_open() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let mut reporter = Reporter::new("Homepage");
        reporter.record(result("label"), "Homepage All").unwrap();
        assert!(reporter.finalize_run(&blocker.join("run.jsonl")).await.is_err());
        assert!(!reporter.is_closed());

        let finalized = reporter.finalize_run(&dir.path().join("run.jsonl")).await.unwrap();
        assert_eq!(finalized.records, 1);
    }
}
