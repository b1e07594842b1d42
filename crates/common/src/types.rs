//! Core audit result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Impact level of a single violation, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Minor
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Serious => "serious",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minor" => Ok(Severity::Minor),
            "moderate" => Ok(Severity::Moderate),
            "serious" => Ok(Severity::Serious),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// One rule failure found by an audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    pub description: String,

    /// Link to the rule documentation, when the engine provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,

    /// Locators of the affected elements, in engine order
    #[serde(default)]
    pub nodes: Vec<String>,
}

impl Violation {
    pub fn new(rule_id: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            description: description.into(),
            help_url: None,
            nodes: Vec::new(),
        }
    }

    pub fn with_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_help_url(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }
}

/// Outcome of one audit against one page state
///
/// Produced by the executor and never mutated afterwards; the state label is
/// attached when the result is recorded into a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    url: String,
    timestamp: DateTime<Utc>,
    violations: Vec<Violation>,
}

impl AuditResult {
    pub fn new(url: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self::at(url, Utc::now(), violations)
    }

    pub fn at(url: impl Into<String>, timestamp: DateTime<Utc>, violations: Vec<Violation>) -> Self {
        Self {
            url: url.into(),
            timestamp,
            violations,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations at or above `threshold`
    pub fn at_least(&self, threshold: Severity) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.severity >= threshold)
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}
