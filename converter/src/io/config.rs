//! Converter configuration stored in `converter.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::tool::DEFAULT_SUCCESS_MARKER;

pub const DEFAULT_CONFIG_FILE: &str = "converter.toml";
pub const DEFAULT_LOG_FILE: &str = "conversion_log.txt";
pub const DEFAULT_TOOL_PATH: &str = r"C:\Program Files\GameMaker\ProjectTool\ProjectTool.exe";

/// Converter configuration (TOML).
///
/// Missing fields take their defaults, so an empty or absent file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConverterConfig {
    /// Path to `ProjectTool.exe`.
    pub tool_path: PathBuf,

    /// Prefabs library passed as `PREFABSFOLDER=`.
    pub prefabs_folder: PathBuf,

    /// Stdout substring that marks a successful conversion.
    pub success_marker: String,

    /// Kill the tool after this many seconds.
    pub tool_timeout_secs: u64,

    /// Keep at most this many bytes of tool stdout/stderr.
    pub tool_output_limit_bytes: usize,

    /// Pause after a successful in-place conversion before cleaning up, giving
    /// the tool's file writes time to settle.
    pub settle_delay_ms: u64,

    /// Shared log file, truncated at startup.
    pub log_path: PathBuf,

    /// Directory for per-invocation tool stdout/stderr logs. Disabled when unset.
    pub tool_log_dir: Option<PathBuf>,

    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchConfig {
    /// Directory holding packages and project folders to convert.
    pub projects_dir: Option<PathBuf>,
    /// Directory receiving the converted projects.
    pub output_dir: Option<PathBuf>,
    /// Number of projects converted concurrently.
    pub workers: usize,
    /// JSON summary written after a batch run.
    pub report_path: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            projects_dir: None,
            output_dir: None,
            workers: 4,
            report_path: None,
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from(DEFAULT_TOOL_PATH),
            prefabs_folder: default_prefabs_folder(),
            success_marker: DEFAULT_SUCCESS_MARKER.to_string(),
            tool_timeout_secs: 60 * 60,
            tool_output_limit_bytes: 1_000_000,
            settle_delay_ms: 2_000,
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
            tool_log_dir: None,
            batch: BatchConfig::default(),
        }
    }
}

/// `GameMakerStudio2/Prefabs` under the roaming config dir (`%APPDATA%` on Windows).
pub fn default_prefabs_folder() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_default()
        .join("GameMakerStudio2")
        .join("Prefabs")
}

impl ConverterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tool_path.as_os_str().is_empty() {
            return Err(anyhow!("tool_path must not be empty"));
        }
        if self.success_marker.trim().is_empty() {
            return Err(anyhow!("success_marker must not be empty"));
        }
        if self.tool_timeout_secs == 0 {
            return Err(anyhow!("tool_timeout_secs must be > 0"));
        }
        if self.tool_output_limit_bytes == 0 {
            return Err(anyhow!("tool_output_limit_bytes must be > 0"));
        }
        if self.batch.workers == 0 {
            return Err(anyhow!("batch.workers must be > 0"));
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ConverterConfig::default()`.
pub fn load_config(path: &Path) -> Result<ConverterConfig> {
    if !path.exists() {
        let cfg = ConverterConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ConverterConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ConverterConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, ConverterConfig::default());
        assert_eq!(cfg.batch.workers, 4);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("converter.toml");
        let mut cfg = ConverterConfig::default();
        cfg.batch.projects_dir = Some(PathBuf::from("in"));
        cfg.batch.report_path = Some(PathBuf::from("report.json"));
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("converter.toml");
        fs::write(
            &path,
            "tool_path = \"/opt/ProjectTool\"\n\n[batch]\nworkers = 2\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.tool_path, PathBuf::from("/opt/ProjectTool"));
        assert_eq!(cfg.batch.workers, 2);
        assert_eq!(cfg.success_marker, DEFAULT_SUCCESS_MARKER);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("converter.toml");
        fs::write(&path, "[batch]\nworkers = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }
}
