//! Run report and its JSON Lines sink format
//!
//! A run report is the ordered list of every audit recorded during one run.
//! On disk it is one JSON object per line:
//!
//! ```text
//! {"testSuite":"Homepage","stateLabel":"Homepage All","timestamp":"2026-10-17T09:00:00Z","url":"file:///index.html","violations":[...]}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{AuditResult, Violation};

/// One recorded audit as it appears in the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub test_suite: String,
    pub state_label: String,
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub violations: Vec<Violation>,
}

impl ReportRecord {
    pub fn from_result(test_suite: &str, state_label: &str, result: AuditResult) -> Self {
        let timestamp = result.timestamp();
        let url = result.url().to_string();
        Self {
            test_suite: test_suite.to_string(),
            state_label: state_label.to_string(),
            timestamp,
            url,
            violations: result.into_violations(),
        }
    }
}

/// Ordered records of one run
///
/// Records sharing a state label are all kept, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    records: Vec<ReportRecord>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ReportRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// State labels in record order, duplicates included
    pub fn state_labels(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.state_label.as_str())
    }

    /// All records carrying `label`
    pub fn by_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a ReportRecord> {
        self.records.iter().filter(move |r| r.state_label == label)
    }

    pub fn violation_count(&self) -> usize {
        self.records.iter().map(|r| r.violations.len()).sum()
    }

    /// Write every record as one JSON line
    pub fn write_jsonl<W: Write>(&self, mut writer: W) -> Result<()> {
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Parse a JSON Lines stream; blank lines are ignored
    pub fn read_jsonl<R: BufRead>(reader: R) -> Result<Self> {
        let mut report = Self::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ReportRecord = serde_json::from_str(&line).map_err(|e| {
                Error::Configuration(format!("invalid report record on line {}: {}", index + 1, e))
            })?;
            report.push(record);
        }
        Ok(report)
    }

    /// Persist to `path` atomically: the file either holds the full report or
    /// does not exist.
    pub fn write_sink(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.write_jsonl(std::io::BufWriter::new(tmp.as_file_mut()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!("Wrote {} report record(s) to {}", self.len(), path.display());
        Ok(())
    }

    pub fn read_sink(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_jsonl(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn record(label: &str, rules: &[&str]) -> ReportRecord {
        ReportRecord {
            test_suite: "Mars Commuter".to_string(),
            state_label: label.to_string(),
            timestamp: "2026-10-17T09:30:00Z".parse().unwrap(),
            url: "https://dequeuniversity.com/demo/mars/".to_string(),
            violations: rules
                .iter()
                .map(|r| Violation::new(*r, Severity::Serious, "problem").with_nodes(["#route-type-multi-city"]))
                .collect(),
        }
    }

    #[test]
    fn test_duplicate_labels_preserved_in_order() {
        let mut report = RunReport::new();
        report.push(record("No Change", &["label"]));
        report.push(record("Changed State", &[]));
        report.push(record("No Change", &["region"]));

        let labels: Vec<_> = report.state_labels().collect();
        assert_eq!(labels, vec!["No Change", "Changed State", "No Change"]);
        assert_eq!(report.by_label("No Change").count(), 2);
        assert_eq!(report.violation_count(), 2);
    }

    #[test]
    fn test_jsonl_one_record_per_line() {
        let mut report = RunReport::new();
        report.push(record("a", &["label"]));
        report.push(record("b", &[]));

        let mut buf = Vec::new();
        report.write_jsonl(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["stateLabel"], "a");
        assert_eq!(first["testSuite"], "Mars Commuter");
        assert_eq!(first["timestamp"], "2026-10-17T09:30:00Z");
        assert_eq!(first["violations"][0]["ruleId"], "label");
    }

    #[test]
    fn test_read_rejects_garbage_with_line_number() {
        let input = b"\n{\"not\": \"a record\"}\n";
        let err = RunReport::read_jsonl(&input[..]).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("line 2")));
    }
}
