//! JSON run report summarising every conversion of a batch.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::core::types::ConversionReport;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: String,
    pub finished_at: String,
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    pub results: Vec<ConversionReport>,
}

impl RunReport {
    pub fn new(started_at: String, results: Vec<ConversionReport>) -> Self {
        let converted = results.iter().filter(|r| r.succeeded()).count();
        Self {
            started_at,
            finished_at: timestamp(),
            total: results.len(),
            converted,
            failed: results.len() - converted,
            results,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Current UTC time as RFC 3339 with second precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Write the report as pretty-printed JSON with a trailing newline.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(report).context("serialize report")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::{PackageFormat, ProjectKind};
    use crate::core::types::ConversionStatus;
    use std::path::PathBuf;

    fn result(name: &str, status: ConversionStatus) -> ConversionReport {
        ConversionReport {
            source: PathBuf::from(format!("in/{name}.yyz")),
            destination: PathBuf::from(format!("out/{name}/{name}.yyp")),
            kind: ProjectKind::Package(PackageFormat::Yyz),
            status,
            reason: None,
            rollback_errors: Vec::new(),
            duration_ms: 5,
        }
    }

    #[test]
    fn counts_successes_and_failures() {
        let report = RunReport::new(
            timestamp(),
            vec![
                result("a", ConversionStatus::Converted),
                result("b", ConversionStatus::Failed),
                result("c", ConversionStatus::Converted),
            ],
        );
        assert_eq!(report.total, 3);
        assert_eq!(report.converted, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn writes_pretty_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("reports").join("report.json");
        let report = RunReport::new(timestamp(), vec![result("a", ConversionStatus::Converted)]);

        write_report(&path, &report).expect("write");

        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&contents).expect("parse");
        assert_eq!(value["converted"], 1);
        assert_eq!(value["results"][0]["status"], "converted");
        assert_eq!(value["results"][0]["kind"]["kind"], "package");
        assert_eq!(value["results"][0]["kind"]["format"], "yyz");
    }
}
