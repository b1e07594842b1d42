//! Audit-only vs enforcing evaluation of an audit result

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{AuditResult, Severity, Violation};

/// How a caller wants an audit result judged
///
/// The executor never sees this value; it is applied after the result exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuditPolicy {
    /// Record violations for trend tracking, never fail
    AuditOnly,

    /// Fail when any violation at or above `threshold` is present
    Enforcing {
        #[serde(default)]
        threshold: Severity,
    },
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::AuditOnly
    }
}

impl AuditPolicy {
    /// Enforcing policy that fails on any violation
    pub fn enforcing() -> Self {
        Self::Enforcing {
            threshold: Severity::Minor,
        }
    }

    pub fn enforcing_at(threshold: Severity) -> Self {
        Self::Enforcing { threshold }
    }

    pub fn evaluate(&self, result: &AuditResult, state_label: &str) -> PolicyOutcome {
        match self {
            AuditPolicy::AuditOnly => PolicyOutcome::Passed {
                recorded: result.violations().len(),
            },
            AuditPolicy::Enforcing { threshold } => {
                let blocking: Vec<Violation> = result.at_least(*threshold).cloned().collect();
                if blocking.is_empty() {
                    PolicyOutcome::Passed {
                        recorded: result.violations().len(),
                    }
                } else {
                    PolicyOutcome::Failed(AccessibilityFailure {
                        state_label: state_label.to_string(),
                        url: result.url().to_string(),
                        threshold: *threshold,
                        violations: blocking,
                    })
                }
            }
        }
    }
}

/// User-visible verdict of one audit under a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// No blocking violations; `recorded` counts every violation that was logged
    Passed { recorded: usize },
    Failed(AccessibilityFailure),
}

impl PolicyOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PolicyOutcome::Failed(_))
    }

    pub fn into_result(self) -> std::result::Result<(), AccessibilityFailure> {
        match self {
            PolicyOutcome::Passed { .. } => Ok(()),
            PolicyOutcome::Failed(failure) => Err(failure),
        }
    }
}

/// Assertion failure raised by an enforcing audit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessibilityFailure {
    pub state_label: String,
    pub url: String,
    pub threshold: Severity,
    pub violations: Vec<Violation>,
}

impl fmt::Display for AccessibilityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Expected '{}' ({}) to have no {}+ accessibility violations, found {}:",
            self.state_label,
            self.url,
            self.threshold,
            self.violations.len()
        )?;
        for v in &self.violations {
            writeln!(
                f,
                "  [{}] {}: {} ({} node(s))",
                v.severity,
                v.rule_id,
                v.description,
                v.nodes.len()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for AccessibilityFailure {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn result_with(severities: &[Severity]) -> AuditResult {
        let violations = severities
            .iter()
            .enumerate()
            .map(|(i, s)| Violation::new(format!("rule-{}", i), *s, "problem"))
            .collect();
        AuditResult::new("https://example.test/", violations)
    }

    #[test_case(&[] ; "no violations")]
    #[test_case(&[Severity::Critical] ; "one critical")]
    #[test_case(&[Severity::Minor, Severity::Serious, Severity::Critical] ; "many")]
    fn test_audit_only_never_fails(severities: &[Severity]) {
        let outcome = AuditPolicy::AuditOnly.evaluate(&result_with(severities), "home");
        assert_eq!(outcome, PolicyOutcome::Passed { recorded: severities.len() });
    }

    #[test_case(&[], Severity::Minor, false ; "clean page passes")]
    #[test_case(&[Severity::Minor], Severity::Minor, true ; "minor fails at minor")]
    #[test_case(&[Severity::Minor, Severity::Moderate], Severity::Serious, false ; "below threshold passes")]
    #[test_case(&[Severity::Moderate, Severity::Serious], Severity::Serious, true ; "at threshold fails")]
    #[test_case(&[Severity::Critical], Severity::Critical, true ; "critical fails at critical")]
    fn test_enforcing_fails_iff_blocking(severities: &[Severity], threshold: Severity, fails: bool) {
        let outcome = AuditPolicy::enforcing_at(threshold).evaluate(&result_with(severities), "home");
        assert_eq!(outcome.is_failure(), fails);
    }

    #[test]
    fn test_failure_lists_only_blocking_violations() {
        let result = result_with(&[Severity::Minor, Severity::Critical]);
        let failure = AuditPolicy::enforcing_at(Severity::Serious)
            .evaluate(&result, "Deque University")
            .into_result()
            .unwrap_err();
        assert_eq!(failure.violations.len(), 1);
        assert_eq!(failure.violations[0].severity, Severity::Critical);
        let message = failure.to_string();
        assert!(message.contains("Deque University"));
        assert!(message.contains("rule-1"));
    }
}
