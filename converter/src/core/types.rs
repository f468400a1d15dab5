//! Shared deterministic types for conversion planning and reporting.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::naming::ProjectKind;

/// How an in-place conversion treats the original project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertMode {
    /// Original is consumed: staged copies and transient folders are deleted on success.
    #[default]
    Replace,
    /// Original is kept: packages move into the new project folder, project
    /// files stay in the staging directory.
    Preserve,
}

/// Final state of one project after the procedure ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// Tool reported success and post-conversion cleanup ran.
    Converted,
    /// Conversion did not succeed; no staging had to be undone.
    Failed,
    /// Conversion did not succeed and staging moves were reversed.
    RolledBack,
}

impl ConversionStatus {
    pub fn is_success(self) -> bool {
        self == ConversionStatus::Converted
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConversionStatus::Converted => "converted",
            ConversionStatus::Failed => "failed",
            ConversionStatus::RolledBack => "rolled back",
        };
        f.write_str(label)
    }
}

/// Outcome record for a single project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: ProjectKind,
    pub status: ConversionStatus,
    /// Why the conversion did not succeed, when it did not.
    pub reason: Option<String>,
    /// Rollback steps that could not be completed.
    pub rollback_errors: Vec<String>,
    pub duration_ms: u64,
}

impl ConversionReport {
    pub fn succeeded(&self) -> bool {
        self.status.is_success()
    }
}
