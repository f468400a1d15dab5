//! In-place conversion of a single project file or package.
//!
//! The original project is staged out of the way, the tool writes the new
//! project next to it, and leftovers are deleted. If anything fails before
//! the conversion is complete, the staging journal puts the original layout
//! back.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{error, info, instrument, warn};

use crate::core::layout::{PackagePlan, ProjectFilePlan};
use crate::core::naming::ProjectName;
use crate::core::types::{ConversionReport, ConversionStatus, ConvertMode};
use crate::io::config::ConverterConfig;
use crate::io::fs_ops;
use crate::io::staging::StagingJournal;
use crate::io::tool::{ProjectTool, SaveRequest, run_save};

/// Settings shared by in-place and batch conversions.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub mode: ConvertMode,
    pub prefabs_folder: PathBuf,
    pub tool_timeout: Duration,
    pub output_limit_bytes: usize,
    /// Pause between a successful package conversion and its cleanup.
    pub settle_delay: Duration,
    pub tool_log_dir: Option<PathBuf>,
}

impl ConvertOptions {
    pub fn from_config(cfg: &ConverterConfig, mode: ConvertMode) -> Self {
        Self {
            mode,
            prefabs_folder: cfg.prefabs_folder.clone(),
            tool_timeout: cfg.tool_timeout(),
            output_limit_bytes: cfg.tool_output_limit_bytes,
            settle_delay: cfg.settle_delay(),
            tool_log_dir: cfg.tool_log_dir.clone(),
        }
    }

    pub fn save_request(&self, source: &Path, destination: &Path, name: &ProjectName) -> SaveRequest {
        SaveRequest {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            prefabs_folder: self.prefabs_folder.clone(),
            timeout: self.tool_timeout,
            output_limit_bytes: self.output_limit_bytes,
            log_path: self
                .tool_log_dir
                .as_ref()
                .map(|dir| dir.join(format!("{}.log", name.file_name()))),
        }
    }
}

/// Convert the project at `path` in place.
///
/// Returns `Err` only when `path` is not a convertible project file. Every
/// failure after that point is reported through the returned status.
#[instrument(skip_all, fields(project = %path.display()))]
pub fn convert_single_project<T: ProjectTool + ?Sized>(
    path: &Path,
    tool: &T,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let start = Instant::now();
    let path = std::path::absolute(path)
        .with_context(|| format!("resolve project path {}", path.display()))?;
    if !path.is_file() {
        bail!("project file not found: {}", path.display());
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid project path {}", path.display()))?
        .to_string();
    let name = ProjectName::parse(&file_name)
        .ok_or_else(|| anyhow!("unsupported project file {file_name}"))?;

    info!("=== Starting conversion of: {file_name} ===");
    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), mode = ?options.mode, "converting project in directory");
    }

    let mut journal = StagingJournal::default();
    let (destination, attempt) = if name.kind.is_package() {
        let plan = PackagePlan::new(&path, options.mode)?;
        let attempt = convert_package(&plan, tool, options, &mut journal);
        (plan.destination_dir, attempt)
    } else {
        let plan = ProjectFilePlan::new(&path, options.mode)?;
        let attempt = convert_project_file(&plan, tool, options, &mut journal);
        (plan.destination, attempt)
    };

    let (status, reason, rollback_errors) = match attempt {
        Ok(()) => {
            info!("Successfully converted project: {file_name}");
            (ConversionStatus::Converted, None, Vec::new())
        }
        Err(err) => {
            let reason = format!("{err:#}");
            error!(reason = %reason, "Conversion failed for: {file_name}");
            if journal.is_empty() {
                (ConversionStatus::Failed, Some(reason), Vec::new())
            } else {
                let rollback_errors = journal.rollback();
                if rollback_errors.is_empty() {
                    info!("restored original layout");
                } else {
                    warn!(
                        failed_steps = rollback_errors.len(),
                        "original layout only partially restored"
                    );
                }
                (ConversionStatus::RolledBack, Some(reason), rollback_errors)
            }
        }
    };

    Ok(ConversionReport {
        source: path,
        destination,
        kind: name.kind,
        status,
        reason,
        rollback_errors,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn convert_package<T: ProjectTool + ?Sized>(
    plan: &PackagePlan,
    tool: &T,
    options: &ConvertOptions,
    journal: &mut StagingJournal,
) -> Result<()> {
    if plan.is_renamed() {
        match plan.mode {
            ConvertMode::Replace => journal.move_path(&plan.source, &plan.staged_source)?,
            ConvertMode::Preserve => journal.copy_file(&plan.source, &plan.staged_source)?,
        }
        info!(staged = %plan.staged_source.display(), "staged package under shortened name");
    }

    // Only a folder created by this run is removed on rollback.
    if !fs_ops::exists(&plan.destination_dir) {
        journal.expect_output(&plan.destination_dir);
    }
    let request = options.save_request(&plan.staged_source, &plan.destination_dir, &plan.name);
    run_save(tool, &request).map_err(|reason| anyhow!(reason))?;

    thread::sleep(options.settle_delay);

    match plan.mode {
        ConvertMode::Replace => {
            // Whichever file the tool read is consumed.
            fs_ops::remove_logged("package", &plan.staged_source);
        }
        ConvertMode::Preserve => {
            if plan.is_renamed() {
                fs_ops::remove_logged("temporary package", &plan.staged_source);
            }
            if !plan.destination_dir.is_dir() {
                bail!(
                    "project folder was not created at {}",
                    plan.destination_dir.display()
                );
            }
            if fs_ops::exists(&plan.source) {
                let archived = plan.archived_source();
                fs_ops::move_path(&plan.source, &archived)
                    .context("move original package into project folder")?;
                info!(path = %archived.display(), "moved original package");
            } else {
                warn!(path = %plan.source.display(), "original package not found");
            }
        }
    }

    for transient in plan.transients() {
        fs_ops::remove_transient(&transient);
    }
    Ok(())
}

fn convert_project_file<T: ProjectTool + ?Sized>(
    plan: &ProjectFilePlan,
    tool: &T,
    options: &ConvertOptions,
    journal: &mut StagingJournal,
) -> Result<()> {
    if plan.destination != plan.source && fs_ops::exists(&plan.destination) {
        bail!(
            "converted project {} already exists",
            plan.destination.display()
        );
    }
    let entries = entries_to_stage(plan)?;

    journal.create_dir(&plan.staging_dir)?;
    journal.move_path(&plan.source, &plan.staged_source)?;
    for entry in &entries {
        journal.move_path(&plan.dir.join(entry), &plan.staging_dir.join(entry))?;
    }
    info!(
        staging_dir = %plan.staging_dir.display(),
        staged_entries = entries.len(),
        "staged original project"
    );

    journal.expect_output(&plan.destination);
    let request = options.save_request(&plan.staged_source, &plan.destination, &plan.name);
    run_save(tool, &request).map_err(|reason| anyhow!(reason))?;

    for transient in plan.transients() {
        fs_ops::remove_transient(&transient);
    }
    Ok(())
}

/// Siblings of the project file that move into the staging dir, sorted by name.
fn entries_to_stage(plan: &ProjectFilePlan) -> Result<Vec<std::ffi::OsString>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(&plan.dir).with_context(|| format!("read {}", plan.dir.display()))? {
        let entry = entry.context("read directory entry")?;
        if entry.path() == plan.source {
            continue;
        }
        let is_dir = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?
            .is_dir();
        let name = entry.file_name();
        if plan.should_stage(&name.to_string_lossy(), is_dir) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
