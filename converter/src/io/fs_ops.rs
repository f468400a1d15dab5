//! Move/copy/remove primitives used by the staging procedures.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::layout::Transient;

/// True if anything (file, directory or dangling link) exists at `path`.
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Move a file or directory to an exact destination.
///
/// Refuses to overwrite an existing destination. Falls back to copy + remove
/// when a plain rename crosses filesystems.
pub fn move_path(from: &Path, to: &Path) -> Result<()> {
    if exists(to) {
        bail!("cannot move {}: {} already exists", from.display(), to.display());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    match fs::rename(from, to) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying");
            copy_path(from, to)?;
            remove_path(from)?;
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("move {} to {}", from.display(), to.display()));
        }
    }
    debug!(from = %from.display(), to = %to.display(), "moved");
    Ok(())
}

/// Copy a file, or a directory tree, to `to`. An existing destination file is replaced.
pub fn copy_path(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::metadata(from).with_context(|| format!("stat {}", from.display()))?;
    if !meta.is_dir() {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::copy(from, to)
            .with_context(|| format!("copy {} to {}", from.display(), to.display()))?;
        return Ok(());
    }

    for entry in WalkDir::new(from) {
        let entry = entry.with_context(|| format!("walk {}", from.display()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_context(|| format!("create {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

/// Remove a file or a directory tree.
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if meta.is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("remove directory {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("remove file {}", path.display()))
    }
}

/// Remove `path` if present. Returns whether anything was removed.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    if !exists(path) {
        return Ok(false);
    }
    remove_path(path)?;
    Ok(true)
}

/// Remove `dir` only if it is an empty directory.
pub fn remove_dir_if_empty(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))?;
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).with_context(|| format!("remove directory {}", dir.display()))?;
    Ok(true)
}

/// Best-effort removal. Errors are logged, never returned.
pub fn remove_logged(label: &str, path: &Path) {
    match remove_if_exists(path) {
        Ok(true) => info!(label, path = %path.display(), "removed"),
        Ok(false) => {}
        Err(err) => warn!(label, err = %format!("{err:#}"), "error removing"),
    }
}

/// Best-effort removal of a leftover folder.
pub fn remove_transient(transient: &Transient) {
    remove_logged(transient.label, &transient.path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_path_moves_directories_with_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let from = temp.path().join("sprites");
        fs::create_dir_all(from.join("spr_player")).expect("mkdir");
        fs::write(from.join("spr_player/spr_player.yy"), "{}").expect("write");

        let to = temp.path().join("_old").join("sprites");
        move_path(&from, &to).expect("move");

        assert!(!from.exists());
        assert!(to.join("spr_player/spr_player.yy").is_file());
    }

    #[test]
    fn move_path_refuses_to_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let from = temp.path().join("a.yyp");
        let to = temp.path().join("b.yyp");
        fs::write(&from, "a").expect("write");
        fs::write(&to, "b").expect("write");

        let err = move_path(&from, &to).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&to).expect("read"), "b");
        assert!(from.exists());
    }

    #[test]
    fn copy_path_copies_trees() {
        let temp = tempfile::tempdir().expect("tempdir");
        let from = temp.path().join("assets");
        fs::create_dir_all(from.join("nested")).expect("mkdir");
        fs::write(from.join("nested/readme.txt"), "hi").expect("write");

        let to = temp.path().join("out").join("assets");
        copy_path(&from, &to).expect("copy");

        assert_eq!(
            fs::read_to_string(to.join("nested/readme.txt")).expect("read"),
            "hi"
        );
        assert!(from.join("nested/readme.txt").exists());
    }

    #[test]
    fn remove_if_exists_reports_absence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("options");
        assert!(!remove_if_exists(&dir).expect("remove missing"));
        fs::create_dir_all(dir.join("windows")).expect("mkdir");
        assert!(remove_if_exists(&dir).expect("remove"));
        assert!(!dir.exists());
    }

    #[test]
    fn remove_dir_if_empty_keeps_non_empty_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("_old");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("left.txt"), "x").expect("write");
        assert!(!remove_dir_if_empty(&dir).expect("check"));
        fs::remove_file(dir.join("left.txt")).expect("rm");
        assert!(remove_dir_if_empty(&dir).expect("remove"));
        assert!(!dir.exists());
    }
}
