//! Audit request composition
//!
//! An [`AuditRequest`] is assembled through the fluent [`AuditRequestBuilder`]:
//!
//! ```
//! use a11y_common::AuditRequest;
//!
//! let request = AuditRequest::builder()
//!     .within(".jumbotron")
//!     .skipping(["color-contrast"])
//!     .according_to("wcag2a")
//!     .build()
//!     .unwrap();
//! assert_eq!(request.scope(), Some(".jumbotron"));
//! ```
//!
//! Validation is deferred to `build()`, so intermediate builder states are
//! never observed by the executor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Immutable description of what one audit should evaluate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclude: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    ruleset: Option<String>,

    /// Empty means every rule in the rule set
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    only_rules: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    skip_rules: BTreeSet<String>,
}

impl AuditRequest {
    pub fn builder() -> AuditRequestBuilder {
        AuditRequestBuilder::default()
    }

    /// Request that audits the whole document with every rule
    pub fn full_page() -> Self {
        Self::default()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn exclude(&self) -> Option<&str> {
        self.exclude.as_deref()
    }

    pub fn ruleset(&self) -> Option<&str> {
        self.ruleset.as_deref()
    }

    pub fn only_rules(&self) -> &BTreeSet<String> {
        &self.only_rules
    }

    pub fn skip_rules(&self) -> &BTreeSet<String> {
        &self.skip_rules
    }

    /// Whether a violation of `rule_id` belongs in this request's result
    pub fn admits(&self, rule_id: &str) -> bool {
        if self.skip_rules.contains(rule_id) {
            return false;
        }
        self.only_rules.is_empty() || self.only_rules.contains(rule_id)
    }

    /// Reopen this request as a builder, keeping every constraint
    pub fn to_builder(&self) -> AuditRequestBuilder {
        AuditRequestBuilder {
            scope: self.scope.clone(),
            exclude: self.exclude.clone(),
            ruleset: self.ruleset.clone(),
            only_rules: self.only_rules.clone(),
            skip_rules: self.skip_rules.clone(),
        }
    }
}

/// Fluent accumulator for [`AuditRequest`]
///
/// Every setter is idempotent: repeating a call with the same argument leaves
/// the builder unchanged. Scalar settings are last-write-wins; rule lists
/// accumulate as sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditRequestBuilder {
    scope: Option<String>,
    exclude: Option<String>,
    ruleset: Option<String>,
    only_rules: BTreeSet<String>,
    skip_rules: BTreeSet<String>,
}

impl AuditRequestBuilder {
    /// Restrict the audit to elements matching `selector`
    pub fn within(mut self, selector: impl Into<String>) -> Self {
        self.scope = Some(selector.into());
        self
    }

    /// Leave elements matching `selector` out of the audit
    pub fn excluding(mut self, selector: impl Into<String>) -> Self {
        self.exclude = Some(selector.into());
        self
    }

    /// Evaluate only the rules tagged with `ruleset` (e.g. "wcag2a")
    pub fn according_to(mut self, ruleset: impl Into<String>) -> Self {
        self.ruleset = Some(ruleset.into());
        self
    }

    /// Evaluate only the named rules
    pub fn checking_only<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_rules.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Evaluate every rule except the named ones
    pub fn skipping<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_rules.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Validate the accumulated constraints and freeze them
    pub fn build(self) -> Result<AuditRequest> {
        let scope = non_blank("within", self.scope)?;
        let exclude = non_blank("excluding", self.exclude)?;
        let ruleset = non_blank("according_to", self.ruleset)?;

        if let Some(blank) = self
            .only_rules
            .iter()
            .chain(self.skip_rules.iter())
            .find(|id| id.trim().is_empty())
        {
            return Err(Error::Configuration(format!(
                "rule id must not be blank (got {:?})",
                blank
            )));
        }

        let overlap: Vec<&str> = self
            .only_rules
            .intersection(&self.skip_rules)
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            return Err(Error::Configuration(format!(
                "rules both checked and skipped: {}",
                overlap.join(", ")
            )));
        }

        Ok(AuditRequest {
            scope,
            exclude,
            ruleset,
            only_rules: self.only_rules,
            skip_rules: self.skip_rules,
        })
    }
}

fn non_blank(setting: &str, value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(Error::Configuration(format!(
            "{} was set to a blank value",
            setting
        ))),
        other => Ok(other),
    }
}
