//! Out-of-place batch conversion on a fixed-size worker pool.
//!
//! Sources are left in place: projects with an author prefix are converted
//! from a temporary shortened-name copy, and results land in the output tree.

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use rayon::prelude::*;
use tracing::{error, info, instrument, warn};

use crate::convert::ConvertOptions;
use crate::core::layout::BatchPlan;
use crate::core::types::{ConversionReport, ConversionStatus};
use crate::discover::BatchTask;
use crate::io::fs_ops;
use crate::io::report::{RunReport, timestamp};
use crate::io::staging::StagingJournal;
use crate::io::tool::{ProjectTool, run_save};

/// Convert all `tasks` using `workers` threads. Results keep task order.
pub fn run_batch<T: ProjectTool + ?Sized>(
    tasks: &[BatchTask],
    tool: &T,
    options: &ConvertOptions,
    workers: usize,
) -> Result<RunReport> {
    let started_at = timestamp();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|index| format!("convert-{index}"))
        .build()
        .context("build worker pool")?;

    info!(tasks = tasks.len(), workers, "starting batch conversion");
    let results: Vec<ConversionReport> = pool.install(|| {
        tasks
            .par_iter()
            .map(|task| {
                let result = convert_task(task, tool, options);
                if result.succeeded() {
                    info!(project = %task.source.display(), "Project processed successfully.");
                } else {
                    warn!(project = %task.source.display(), "Project processing failed.");
                }
                result
            })
            .collect()
    });

    let report = RunReport::new(started_at, results);
    info!(
        total = report.total,
        converted = report.converted,
        failed = report.failed,
        "batch conversion finished"
    );
    Ok(report)
}

/// Convert one task into the output tree. Never fails; errors land in the report.
#[instrument(skip_all, fields(project = %task.source.display()))]
pub fn convert_task<T: ProjectTool + ?Sized>(
    task: &BatchTask,
    tool: &T,
    options: &ConvertOptions,
) -> ConversionReport {
    let start = Instant::now();
    info!("Processing project: {}", task.source.display());

    let mut journal = StagingJournal::default();
    let (status, reason, rollback_errors) = match run_task(task, tool, options, &mut journal) {
        Ok(()) => (ConversionStatus::Converted, None, Vec::new()),
        Err(err) => {
            let reason = format!("{err:#}");
            error!(reason = %reason, "Saving project failed");
            if journal.is_empty() {
                (ConversionStatus::Failed, Some(reason), Vec::new())
            } else {
                let rollback_errors = journal.rollback();
                (ConversionStatus::RolledBack, Some(reason), rollback_errors)
            }
        }
    };

    ConversionReport {
        source: task.source.clone(),
        destination: task.destination.clone(),
        kind: task.kind,
        status,
        reason,
        rollback_errors,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn run_task<T: ProjectTool + ?Sized>(
    task: &BatchTask,
    tool: &T,
    options: &ConvertOptions,
    journal: &mut StagingJournal,
) -> Result<()> {
    if let Some(first) = &task.duplicate_of {
        bail!(
            "{} is already converted to {} from {}",
            task.source.display(),
            task.destination.display(),
            first.display()
        );
    }
    let plan = BatchPlan::new(&task.source, &task.destination)?;
    // Any file at the shortened name is a project of its own, never a leftover.
    if let Some(existing) = plan.temp_source.as_deref().filter(|temp| fs_ops::exists(temp)) {
        bail!(
            "cannot stage {} under its shortened name: {} already exists",
            task.source.display(),
            existing.display()
        );
    }
    journal.create_dir(&plan.destination_dir)?;

    if let Some(temp) = &plan.temp_source {
        journal.copy_file(&plan.source, temp)?;
        info!(temp = %temp.display(), "created temporary file with shortened name");
    }

    if !fs_ops::exists(&plan.destination) {
        journal.expect_output(&plan.destination);
    }
    let request = options.save_request(plan.tool_source(), &plan.destination, &plan.name);
    let saved = run_save(tool, &request);

    if let Some(temp) = &plan.temp_source {
        fs_ops::remove_logged("temporary file", temp);
    }
    saved.map_err(|reason| anyhow!(reason))?;

    for transient in plan.transients() {
        fs_ops::remove_transient(&transient);
    }
    if !task.kind.is_package() {
        copy_extra_items(&plan)?;
    }
    Ok(())
}

/// Copy non-project files and folders next to the source into the output
/// project. Per-item failures are logged and skipped.
fn copy_extra_items(plan: &BatchPlan) -> Result<()> {
    let mut entries = fs::read_dir(&plan.source_dir)
        .with_context(|| format!("read {}", plan.source_dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("read entries of {}", plan.source_dir.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        let path = entry.path();
        if !plan.is_extra_item(&name.to_string_lossy(), &path) {
            continue;
        }
        let target = plan.destination_dir.join(&name);
        match fs_ops::copy_path(&path, &target) {
            Ok(()) => info!(item = %name.to_string_lossy(), "copied additional item"),
            Err(err) => warn!(
                item = %name.to_string_lossy(),
                err = %format!("{err:#}"),
                "error copying additional item"
            ),
        }
    }
    Ok(())
}
