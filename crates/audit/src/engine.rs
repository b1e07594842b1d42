//! Audit engines: the page-side rule evaluators

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::debug;

use a11y_common::{AuditRequest, Error, Result, Severity, Violation};

use crate::session::BrowserSession;

/// Evaluates accessibility rules against the page behind a session
///
/// Engines must only inspect the page, never change it.
#[async_trait]
pub trait AuditEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, session: &dyn BrowserSession, request: &AuditRequest) -> Result<Vec<Violation>>;
}

const AXE_PRESENT: &str = "return typeof window.axe === 'object' && typeof window.axe.run === 'function';";

const AXE_RUN: &str = r#"
var context = arguments[0] || document;
var options = arguments[1];
var done = arguments[arguments.length - 1];
window.axe.run(context, options).then(
  function (result) { done({ ok: true, violations: result.violations }); },
  function (err) { done({ ok: false, error: String((err && err.message) || err) }); }
);
"#;

/// axe-core engine injected into the page as a script
pub struct AxeEngine {
    source: String,
}

impl AxeEngine {
    /// Engine backed by the given axe-core script source
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    /// Engine for pages that already load axe-core themselves
    pub fn preloaded() -> Self {
        Self::new(String::new())
    }

    /// Load a custom axe-core build from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read audit script {}: {}", path.display(), e))
        })?;
        if source.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "audit script {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(source))
    }

    /// Inject the script unless the page already has axe loaded
    async fn ensure_injected(&self, session: &dyn BrowserSession) -> Result<()> {
        if is_present(session).await? {
            return Ok(());
        }
        if self.source.is_empty() {
            return Err(Error::AuditEngine("audit script not injected".to_string()));
        }
        debug!("Injecting audit script ({} bytes)", self.source.len());
        session.execute_script(&self.source, vec![]).await?;

        if !is_present(session).await? {
            return Err(Error::AuditEngine("audit script not injected".to_string()));
        }
        Ok(())
    }
}

async fn is_present(session: &dyn BrowserSession) -> Result<bool> {
    Ok(session
        .execute_script(AXE_PRESENT, vec![])
        .await?
        .as_bool()
        .unwrap_or(false))
}

/// Translate a request into axe `context` and `options` arguments
pub fn axe_arguments(request: &AuditRequest) -> (Value, Value) {
    let context = match (request.scope(), request.exclude()) {
        (None, None) => Value::Null,
        (scope, exclude) => {
            let mut ctx = Map::new();
            if let Some(scope) = scope {
                ctx.insert("include".to_string(), json!([[scope]]));
            }
            if let Some(exclude) = exclude {
                ctx.insert("exclude".to_string(), json!([[exclude]]));
            }
            Value::Object(ctx)
        }
    };

    let mut options = Map::new();
    options.insert("resultTypes".to_string(), json!(["violations"]));

    if !request.only_rules().is_empty() {
        options.insert(
            "runOnly".to_string(),
            json!({ "type": "rule", "values": request.only_rules() }),
        );
    } else if let Some(ruleset) = request.ruleset() {
        options.insert(
            "runOnly".to_string(),
            json!({ "type": "tag", "values": [ruleset] }),
        );
    }

    if !request.skip_rules().is_empty() {
        let rules: Map<String, Value> = request
            .skip_rules()
            .iter()
            .map(|id| (id.clone(), json!({ "enabled": false })))
            .collect();
        options.insert("rules".to_string(), Value::Object(rules));
    }

    (context, Value::Object(options))
}

#[derive(Debug, Deserialize)]
struct AxeOutcome {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    violations: Vec<AxeViolation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AxeViolation {
    id: String,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    help: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    help_url: Option<String>,
    #[serde(default)]
    nodes: Vec<AxeNode>,
}

#[derive(Debug, Deserialize)]
struct AxeNode {
    #[serde(default)]
    target: Vec<Value>,
}

impl AxeNode {
    /// Flatten an axe target (frame and shadow DOM selectors) to one locator
    fn locator(&self) -> String {
        self.target
            .iter()
            .map(|part| match part {
                Value::String(s) => s.clone(),
                Value::Array(inner) => inner
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" >>> "),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Decode the value returned by the axe run script
pub fn parse_axe_outcome(value: Value) -> Result<Vec<Violation>> {
    let outcome: AxeOutcome = serde_json::from_value(value)
        .map_err(|e| Error::AuditEngine(format!("unexpected audit result shape: {}", e)))?;

    if !outcome.ok {
        return Err(Error::AuditEngine(
            outcome.error.unwrap_or_else(|| "audit failed without a message".to_string()),
        ));
    }

    Ok(outcome
        .violations
        .into_iter()
        .map(|v| {
            let severity = v
                .impact
                .as_deref()
                .and_then(|i| i.parse::<Severity>().ok())
                .unwrap_or_default();
            let description = if v.help.is_empty() { v.description } else { v.help };
            Violation {
                rule_id: v.id,
                severity,
                description,
                help_url: v.help_url,
                nodes: v.nodes.iter().map(AxeNode::locator).collect(),
            }
        })
        .collect())
}

#[async_trait]
impl AuditEngine for AxeEngine {
    fn name(&self) -> &str {
        "axe-core"
    }

    async fn run(&self, session: &dyn BrowserSession, request: &AuditRequest) -> Result<Vec<Violation>> {
        self.ensure_injected(session).await?;

        let (context, options) = axe_arguments(request);
        debug!("Running axe with context={} options={}", context, options);

        let value = session.execute_async_script(AXE_RUN, vec![context, options]).await?;
        parse_axe_outcome(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_page_arguments() {
        let (context, options) = axe_arguments(&AuditRequest::full_page());
        assert!(context.is_null());
        assert_eq!(options, json!({ "resultTypes": ["violations"] }));
    }

    #[test]
    fn test_scoped_ruleset_with_skips() {
        let request = AuditRequest::builder()
            .within(".jumbotron")
            .excluding(".ad")
            .skipping(["color-contrast"])
            .according_to("wcag2a")
            .build()
            .unwrap();
        let (context, options) = axe_arguments(&request);
        assert_eq!(context, json!({ "include": [[".jumbotron"]], "exclude": [[".ad"]] }));
        assert_eq!(options["runOnly"], json!({ "type": "tag", "values": ["wcag2a"] }));
        assert_eq!(options["rules"]["color-contrast"]["enabled"], false);
    }

    #[test]
    fn test_checking_only_takes_precedence_over_ruleset() {
        let request = AuditRequest::builder()
            .checking_only(["label", "aria-roles", "html-has-lang"])
            .according_to("wcag2")
            .build()
            .unwrap();
        let (_, options) = axe_arguments(&request);
        assert_eq!(
            options["runOnly"],
            json!({ "type": "rule", "values": ["aria-roles", "html-has-lang", "label"] })
        );
    }

    #[test]
    fn test_parse_axe_violations() {
        let value = json!({
            "ok": true,
            "violations": [{
                "id": "label",
                "impact": "critical",
                "help": "Form elements must have labels",
                "description": "Ensures every form element has a label",
                "helpUrl": "https://dequeuniversity.com/rules/axe/4.8/label",
                "nodes": [
                    { "target": ["#email"] },
                    { "target": [["#widget", "input.name"]] }
                ]
            }]
        });
        let violations = parse_axe_outcome(value).unwrap();
        assert_eq!(violations.len(), 1);
        let v = &violations[0];
        assert_eq!(v.rule_id, "label");
        assert_eq!(v.severity, Severity::Critical);
        assert_eq!(v.description, "Form elements must have labels");
        assert_eq!(v.nodes, vec!["#email", "#widget >>> input.name"]);
    }

    #[test]
    fn test_parse_missing_impact_defaults_to_minor() {
        let value = json!({ "ok": true, "violations": [{ "id": "region", "impact": null, "nodes": [] }] });
        let violations = parse_axe_outcome(value).unwrap();
        assert_eq!(violations[0].severity, Severity::Minor);
    }

    #[test]
    fn test_parse_engine_failure() {
        let err = parse_axe_outcome(json!({ "ok": false, "error": "No elements found for include" })).unwrap_err();
        assert!(matches!(err, Error::AuditEngine(ref msg) if msg.contains("No elements")));

        let err = parse_axe_outcome(json!(null)).unwrap_err();
        assert!(matches!(err, Error::AuditEngine(_)));
    }

    #[test]
    fn test_from_file_rejects_missing_script() {
        let err = AxeEngine::from_file(Path::new("/nonexistent/axe.js")).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
