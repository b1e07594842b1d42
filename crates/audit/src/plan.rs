//! Declarative YAML audit plans

use serde::{Deserialize, Serialize};
use std::path::Path;

use a11y_common::{AuditPolicy, AuditRequest, AuditRequestBuilder, Error, Result, Severity};

use crate::session::Locator;

/// A complete audit plan parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPlan {
    /// Unique name for this plan
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Suite name for the plan's records (run default otherwise)
    #[serde(default)]
    pub suite: Option<String>,

    /// Tags for filtering plans
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order
    pub steps: Vec<PlanStep>,
}

/// A single step in a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanStep {
    /// Load a URL
    Navigate { url: String },

    /// Click an element
    Click {
        #[serde(flatten)]
        target: Target,
    },

    /// Type into an element
    SendKeys {
        #[serde(flatten)]
        target: Target,
        text: String,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Audit the current page state
    Audit(AuditStep),
}

/// Element addressed by CSS selector or element id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Target {
    pub fn locator(&self) -> Result<Locator> {
        match (&self.selector, &self.id) {
            (Some(selector), None) => Ok(Locator::css(selector.clone())),
            (None, Some(id)) => Ok(Locator::id(id.clone())),
            _ => Err(Error::Configuration(
                "step target needs exactly one of `selector` or `id`".to_string(),
            )),
        }
    }
}

/// Audit step options, mirroring the request builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStep {
    /// State label the result is recorded under
    pub label: String,

    #[serde(default)]
    pub within: Option<String>,

    #[serde(default)]
    pub excluding: Option<String>,

    #[serde(default)]
    pub according_to: Option<String>,

    #[serde(default)]
    pub checking_only: Vec<String>,

    #[serde(default)]
    pub skipping: Vec<String>,

    /// Fail the plan when blocking violations are found
    #[serde(default)]
    pub enforce: bool,

    #[serde(default)]
    pub threshold: Option<Severity>,
}

impl AuditStep {
    /// Apply this step's options on top of `base`
    pub fn request(&self, base: AuditRequestBuilder) -> Result<AuditRequest> {
        let mut builder = base;
        if let Some(scope) = &self.within {
            builder = builder.within(scope.clone());
        }
        if let Some(exclude) = &self.excluding {
            builder = builder.excluding(exclude.clone());
        }
        if let Some(ruleset) = &self.according_to {
            builder = builder.according_to(ruleset.clone());
        }
        builder
            .checking_only(self.checking_only.iter().cloned())
            .skipping(self.skipping.iter().cloned())
            .build()
    }

    pub fn policy(&self) -> AuditPolicy {
        if self.enforce {
            AuditPolicy::enforcing_at(self.threshold.unwrap_or_default())
        } else {
            AuditPolicy::AuditOnly
        }
    }
}

impl PlanStep {
    /// Short name for logs and results
    pub fn name(&self) -> String {
        match self {
            PlanStep::Navigate { url } => format!("navigate:{}", url),
            PlanStep::Click { target } => format!("click:{}", describe(target)),
            PlanStep::SendKeys { target, .. } => format!("send_keys:{}", describe(target)),
            PlanStep::Sleep { ms } => format!("sleep:{}ms", ms),
            PlanStep::Audit(step) => format!("audit:{}", step.label),
        }
    }
}

fn describe(target: &Target) -> String {
    target
        .locator()
        .map(|l| l.to_string())
        .unwrap_or_else(|_| "<invalid target>".to_string())
}

impl AuditPlan {
    /// Parse a plan from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Configuration(format!("invalid audit plan: {}", e)))
    }

    /// Parse a plan from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::Configuration(msg) => Error::Configuration(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Load all plans from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> Result<Vec<Self>> {
        let mut plans = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            plans.push(Self::from_file(entry.path())?);
        }

        Ok(plans)
    }

    /// Filter plans by tag
    pub fn filter_by_tag<'a>(plans: &'a [Self], tag: &str) -> Vec<&'a Self> {
        plans.iter().filter(|p| p.tags.iter().any(|t| t == tag)).collect()
    }

    /// Check every step can be turned into a request or locator
    pub fn validate(&self, base: &AuditRequestBuilder) -> Result<()> {
        for step in &self.steps {
            match step {
                PlanStep::Click { target } | PlanStep::SendKeys { target, .. } => {
                    target.locator()?;
                }
                PlanStep::Audit(audit) => {
                    audit.request(base.clone())?;
                }
                PlanStep::Navigate { .. } | PlanStep::Sleep { .. } => {}
            }
        }
        Ok(())
    }
}
