//! Plan runner that drives audit plans through a harness

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use a11y_common::{PolicyOutcome, Result};

use crate::harness::AuditHarness;
use crate::plan::{AuditPlan, PlanStep};

/// Result of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of running a single plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

/// Result of running a set of plans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<PlanResult>,
}

impl PlanSuiteResult {
    pub fn from_results(results: Vec<PlanResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }
}

/// Executes audit plans step by step
pub struct PlanRunner {
    /// Output directory for suite summaries
    output_dir: PathBuf,
}

impl PlanRunner {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Run one plan against the harness's session
    ///
    /// Stops at the first step that errors or fails its audit policy. The
    /// plan's suite name, if any, applies to its records only; the previous
    /// suite name is restored afterwards.
    pub async fn run_plan(&self, harness: &mut AuditHarness, plan: &AuditPlan) -> Result<PlanResult> {
        debug!("Running plan: {}", plan.name);
        plan.validate(&harness.request())?;

        let previous_suite = harness.reporter().suite_name().to_string();
        if let Some(suite) = &plan.suite {
            harness.reporter_mut().set_suite_name(suite.clone());
        }
        let result = self.run_steps(harness, plan).await;
        harness.reporter_mut().set_suite_name(previous_suite);
        Ok(result)
    }

    async fn run_steps(&self, harness: &mut AuditHarness, plan: &AuditPlan) -> PlanResult {
        let start = Instant::now();
        let mut steps = Vec::new();
        let mut plan_error: Option<String> = None;

        for step in &plan.steps {
            let step_start = Instant::now();
            let outcome = self.execute_step(harness, step).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            let (success, violations, error) = match outcome {
                Ok(None) => (true, None, None),
                Ok(Some(PolicyOutcome::Passed { recorded })) => (true, Some(recorded), None),
                Ok(Some(PolicyOutcome::Failed(failure))) => {
                    (false, Some(failure.violations.len()), Some(failure.to_string()))
                }
                Err(e) => (false, None, Some(e.to_string())),
            };

            steps.push(StepResult {
                step_name: step.name(),
                success,
                duration_ms,
                violations,
                error: error.clone(),
            });

            if !success {
                plan_error = error;
                break;
            }
        }

        PlanResult {
            name: plan.name.clone(),
            success: plan_error.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            error: plan_error,
        }
    }

    async fn execute_step(&self, harness: &mut AuditHarness, step: &PlanStep) -> Result<Option<PolicyOutcome>> {
        match step {
            PlanStep::Navigate { url } => {
                harness.session_mut().open(url).await?;
                Ok(None)
            }
            PlanStep::Click { target } => {
                harness.session().click(&target.locator()?).await?;
                Ok(None)
            }
            PlanStep::SendKeys { target, text } => {
                harness.session().send_keys(&target.locator()?, text).await?;
                Ok(None)
            }
            PlanStep::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(None)
            }
            PlanStep::Audit(audit) => {
                let request = audit.request(harness.request())?;
                let outcome = harness.check(&audit.label, &request, audit.policy()).await?;
                Ok(Some(outcome))
            }
        }
    }

    /// Run plans in order, each on the same harness
    pub async fn run_plans(&self, harness: &mut AuditHarness, plans: &[AuditPlan]) -> Result<PlanSuiteResult> {
        let start = Instant::now();
        let mut results = Vec::new();

        info!("Running {} plan(s)...", plans.len());

        for plan in plans {
            let result = match self.run_plan(harness, plan).await {
                Ok(result) => result,
                Err(e) => PlanResult {
                    name: plan.name.clone(),
                    success: false,
                    duration_ms: 0,
                    steps: vec![],
                    error: Some(e.to_string()),
                },
            };
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!("✗ {} - {}", result.name, result.error.as_deref().unwrap_or("unknown error"));
            }
            results.push(result);
        }

        let suite = PlanSuiteResult::from_results(results, start.elapsed().as_millis() as u64);
        info!(
            "Plan results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        Ok(suite)
    }

    /// Load every plan under `dir` and run them
    pub async fn run_dir(&self, harness: &mut AuditHarness, dir: &Path) -> Result<PlanSuiteResult> {
        let plans = AuditPlan::load_all(dir)?;
        self.run_plans(harness, &plans).await
    }

    /// Write the suite summary to JSON
    pub fn write_results(&self, results: &PlanSuiteResult) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("plan-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Plan results written to: {}", path.display());
        Ok(path)
    }
}
