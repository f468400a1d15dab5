//! Enumeration of batch conversion tasks.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::naming::{ProjectKind, ProjectName, batch_project_folder_name};

/// One project to convert from the projects tree into the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTask {
    pub source: PathBuf,
    /// Converted `.yyp` path inside its own output folder.
    pub destination: PathBuf,
    pub kind: ProjectKind,
    /// Source of an earlier task with the same destination. Such a task is
    /// reported as failed without running.
    pub duplicate_of: Option<PathBuf>,
}

/// Collect tasks from `projects_dir`.
///
/// - Package files directly inside `projects_dir` become one task each.
/// - Every `.yyp` / `.project.gmx` one level down becomes a task named
///   after its folder.
///
/// Packages come first, each group sorted by path. A copy of `output_dir`
/// nested inside `projects_dir` is never scanned. When several tasks share a
/// destination, only the first one is converted.
pub fn discover_tasks(projects_dir: &Path, output_dir: &Path) -> Result<Vec<BatchTask>> {
    let output_canonical = fs::canonicalize(output_dir).ok();
    let mut packages = Vec::new();
    let mut projects = Vec::new();

    for (path, file_name) in sorted_entries(projects_dir)? {
        if path.is_file() {
            let Some(name) = ProjectName::parse(&file_name) else {
                continue;
            };
            if !name.kind.is_package() {
                continue;
            }
            let destination = output_dir
                .join(name.package_folder_name())
                .join(name.converted_file_name());
            packages.push(BatchTask {
                source: path,
                destination,
                kind: name.kind,
                duplicate_of: None,
            });
        } else if path.is_dir() {
            if output_canonical.is_some() && fs::canonicalize(&path).ok() == output_canonical {
                debug!(dir = %path.display(), "skipping output directory");
                continue;
            }
            projects.extend(project_tasks(&path, &file_name, output_dir)?);
        }
    }

    info!(
        packages = packages.len(),
        projects = projects.len(),
        "discovered batch tasks"
    );
    packages.extend(projects);
    mark_duplicates(&mut packages);
    Ok(packages)
}

fn mark_duplicates(tasks: &mut [BatchTask]) {
    let mut first_source: HashMap<PathBuf, PathBuf> = HashMap::new();
    for task in tasks.iter_mut() {
        match first_source.entry(task.destination.clone()) {
            Entry::Occupied(first) => {
                warn!(
                    project = %task.source.display(),
                    first = %first.get().display(),
                    "another project converts to the same destination"
                );
                task.duplicate_of = Some(first.get().clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(task.source.clone());
            }
        }
    }
}

fn project_tasks(dir: &Path, folder_name: &str, output_dir: &Path) -> Result<Vec<BatchTask>> {
    let mut tasks = Vec::new();
    for (path, file_name) in sorted_entries(dir)? {
        let Some(name) = ProjectName::parse(&file_name) else {
            continue;
        };
        if name.kind.is_package() || !path.is_file() {
            continue;
        }
        let destination = output_dir
            .join(batch_project_folder_name(folder_name, &name))
            .join(name.converted_file_name());
        tasks.push(BatchTask {
            source: path,
            destination,
            kind: name.kind,
            duplicate_of: None,
        });
    }
    Ok(tasks)
}

fn sorted_entries(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read directory entry")?;
        // Names that are not valid UTF-8 cannot be matched against project extensions.
        if let Ok(name) = entry.file_name().into_string() {
            entries.push((entry.path(), name));
        }
    }
    entries.sort();
    Ok(entries)
}
