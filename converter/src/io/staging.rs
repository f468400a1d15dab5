//! Journal of staging changes so a failed conversion can be undone.
//!
//! Every change made before the tool runs is recorded. On failure the journal
//! is replayed backwards; each undo step is best-effort, and steps that cannot
//! be undone are reported instead of aborting the rest.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info};

use crate::io::fs_ops;

#[derive(Debug, Clone, PartialEq, Eq)]
enum StagingEntry {
    Moved { from: PathBuf, to: PathBuf },
    Copied(PathBuf),
    CreatedDir(PathBuf),
    /// A path the tool is about to write; removed if present on rollback.
    Output(PathBuf),
}

#[derive(Debug, Default)]
pub struct StagingJournal {
    entries: Vec<StagingEntry>,
}

impl StagingJournal {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn move_path(&mut self, from: &Path, to: &Path) -> Result<()> {
        fs_ops::move_path(from, to)?;
        self.entries.push(StagingEntry::Moved {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    /// Copy a file to a new path. Never overwrites.
    pub fn copy_file(&mut self, from: &Path, to: &Path) -> Result<()> {
        if fs_ops::exists(to) {
            bail!("cannot copy {}: {} already exists", from.display(), to.display());
        }
        fs::copy(from, to)
            .with_context(|| format!("copy {} to {}", from.display(), to.display()))?;
        self.entries.push(StagingEntry::Copied(to.to_path_buf()));
        Ok(())
    }

    /// Create `dir` (and parents). Recorded only if it did not exist.
    pub fn create_dir(&mut self, dir: &Path) -> Result<()> {
        if dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        self.entries.push(StagingEntry::CreatedDir(dir.to_path_buf()));
        Ok(())
    }

    pub fn expect_output(&mut self, path: &Path) {
        self.entries.push(StagingEntry::Output(path.to_path_buf()));
    }

    /// Undo every recorded change, newest first. Returns the undo steps that failed.
    pub fn rollback(self) -> Vec<String> {
        let mut errors = Vec::new();
        for entry in self.entries.into_iter().rev() {
            let undone = match &entry {
                StagingEntry::Moved { from, to } => fs_ops::move_path(to, from)
                    .map(|()| info!(path = %from.display(), "moved back")),
                StagingEntry::Copied(path) | StagingEntry::Output(path) => {
                    fs_ops::remove_if_exists(path).map(|removed| {
                        if removed {
                            info!(path = %path.display(), "removed");
                        }
                    })
                }
                StagingEntry::CreatedDir(dir) => fs_ops::remove_dir_if_empty(dir).map(|removed| {
                    if !removed {
                        debug!(dir = %dir.display(), "kept non-empty directory");
                    }
                }),
            };
            if let Err(err) = undone {
                let message = format!("{err:#}");
                error!(err = %message, "rollback step failed");
                errors.push(message);
            }
        }
        errors
    }
}
