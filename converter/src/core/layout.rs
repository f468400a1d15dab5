//! Staging plans: every path an operation reads, moves or deletes.
//!
//! Plans are computed up front from the source path alone so the orchestration
//! code can undo exactly what it did.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::naming::{ProjectFormat, ProjectKind, ProjectName};
use crate::core::types::ConvertMode;

/// Standard GameMaker resource folders that belong to a project.
pub const GM_PROJECT_FOLDERS: [&str; 22] = [
    "sprites",
    "sounds",
    "scripts",
    "paths",
    "objects",
    "rooms",
    "timelines",
    "fonts",
    "notes",
    "datafiles",
    "extensions",
    "options",
    "configs",
    "tilesets",
    "animcurves",
    "sequences",
    "shaders",
    "particles",
    "views",
    "mvc",
    "background",
    "sound",
];

const RESOURCE_ORDER_SUFFIX: &str = ".resource_order";

pub fn is_project_folder(name: &str) -> bool {
    let lower = name.to_lowercase();
    GM_PROJECT_FOLDERS.contains(&lower.as_str())
}

/// A folder the tool leaves behind that is removed after a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transient {
    pub label: &'static str,
    pub path: PathBuf,
}

impl Transient {
    fn new(label: &'static str, path: PathBuf) -> Self {
        Self { label, path }
    }
}

fn parent_and_name(source: &Path) -> Result<(PathBuf, ProjectName)> {
    let file_name = source
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid project path {}", source.display()))?;
    let name = ProjectName::parse(file_name)
        .ok_or_else(|| anyhow!("unsupported project file {}", file_name))?;
    let dir = source
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((dir, name))
}

/// In-place conversion of a single-file package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePlan {
    pub mode: ConvertMode,
    pub name: ProjectName,
    pub dir: PathBuf,
    pub source: PathBuf,
    /// Package handed to the tool: the source itself, or a shortened-name
    /// sibling (moved in replace mode, copied in preserve mode).
    pub staged_source: PathBuf,
    pub destination_dir: PathBuf,
}

impl PackagePlan {
    pub fn new(source: &Path, mode: ConvertMode) -> Result<Self> {
        let (dir, name) = parent_and_name(source)?;
        if !name.kind.is_package() {
            return Err(anyhow!("{} is not a package", source.display()));
        }
        let staged_source = if name.has_author_prefix() {
            dir.join(name.shortened_file_name())
        } else {
            source.to_path_buf()
        };
        let destination_dir = dir.join(name.package_folder_name());
        Ok(Self {
            mode,
            name,
            dir,
            source: source.to_path_buf(),
            staged_source,
            destination_dir,
        })
    }

    pub fn is_renamed(&self) -> bool {
        self.staged_source != self.source
    }

    /// Where a preserved package ends up after success.
    pub fn archived_source(&self) -> PathBuf {
        self.destination_dir.join(self.name.file_name())
    }

    pub fn transients(&self) -> Vec<Transient> {
        match self.mode {
            ConvertMode::Replace => vec![
                Transient::new("options", self.destination_dir.join("options")),
                Transient::new("options_dir", self.destination_dir.join("options_dir")),
                Transient::new("mvc", self.dir.join("mvc")),
                Transient::new("_gmx", self.destination_dir.join("_gmx")),
                Transient::new("_old", self.dir.join("_old")),
            ],
            ConvertMode::Preserve => {
                vec![Transient::new("options", self.destination_dir.join("options"))]
            }
        }
    }
}

/// In-place conversion of a `.yyp` / `.project.gmx` inside its own directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFilePlan {
    pub mode: ConvertMode,
    pub name: ProjectName,
    pub dir: PathBuf,
    pub source: PathBuf,
    pub staging_dir: PathBuf,
    pub staged_source: PathBuf,
    pub destination: PathBuf,
}

impl ProjectFilePlan {
    pub fn new(source: &Path, mode: ConvertMode) -> Result<Self> {
        let (dir, name) = parent_and_name(source)?;
        let is_gmx = match name.kind {
            ProjectKind::ProjectFile(ProjectFormat::ProjectGmx) => true,
            ProjectKind::ProjectFile(ProjectFormat::Yyp) => false,
            ProjectKind::Package(_) => {
                return Err(anyhow!("{} is not a project file", source.display()));
            }
        };
        let staging_name = match (mode, is_gmx) {
            (ConvertMode::Replace, true) => "_gmx",
            (ConvertMode::Preserve, true) => "_old gmx",
            (_, false) => "_old",
        };
        let staging_dir = dir.join(staging_name);
        let staged_source = staging_dir.join(name.file_name());
        let destination = dir.join(name.converted_file_name());
        Ok(Self {
            mode,
            name,
            dir,
            source: source.to_path_buf(),
            staging_dir,
            staged_source,
            destination,
        })
    }

    pub fn staging_dir_name(&self) -> &str {
        self.staging_dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Whether a sibling of the project file is moved into the staging dir.
    pub fn should_stage(&self, entry_name: &str, is_dir: bool) -> bool {
        if is_dir {
            if entry_name == self.staging_dir_name() {
                return false;
            }
            return match self.mode {
                ConvertMode::Replace => is_project_folder(entry_name),
                ConvertMode::Preserve => true,
            };
        }
        self.mode == ConvertMode::Replace && entry_name.ends_with(RESOURCE_ORDER_SUFFIX)
    }

    pub fn transients(&self) -> Vec<Transient> {
        match self.mode {
            ConvertMode::Replace => vec![
                Transient::new("options", self.dir.join("options")),
                Transient::new("options_dir", self.dir.join("options_dir")),
                Transient::new("mvc", self.dir.join("mvc")),
                Transient::new("_gmx", self.dir.join("_gmx")),
                Transient::new("_old", self.dir.join("_old")),
            ],
            ConvertMode::Preserve => vec![Transient::new("options", self.dir.join("options"))],
        }
    }
}

/// Out-of-place conversion of one batch task into the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub name: ProjectName,
    pub source_dir: PathBuf,
    pub source: PathBuf,
    /// Shortened-name copy created beside the source, if the name has an author prefix.
    pub temp_source: Option<PathBuf>,
    pub destination: PathBuf,
    pub destination_dir: PathBuf,
}

impl BatchPlan {
    pub fn new(source: &Path, destination: &Path) -> Result<Self> {
        let (source_dir, name) = parent_and_name(source)?;
        let temp_source = name
            .has_author_prefix()
            .then(|| source_dir.join(name.shortened_file_name()));
        let destination_dir = destination
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("destination has no parent {}", destination.display()))?;
        Ok(Self {
            name,
            source_dir,
            source: source.to_path_buf(),
            temp_source,
            destination: destination.to_path_buf(),
            destination_dir,
        })
    }

    /// Path handed to the tool as `SOURCE=`.
    pub fn tool_source(&self) -> &Path {
        self.temp_source.as_deref().unwrap_or(&self.source)
    }

    pub fn transients(&self) -> Vec<Transient> {
        vec![
            Transient::new("options", self.destination_dir.join("options")),
            Transient::new("options_dir", self.destination_dir.join("options_dir")),
            Transient::new("mvc", self.source_dir.join("mvc")),
        ]
    }

    /// Whether an entry of the source directory is copied into the output
    /// project after a successful conversion.
    pub fn is_extra_item(&self, entry_name: &str, entry_path: &Path) -> bool {
        const SKIPPED_SUFFIXES: [&str; 3] = [".yyp", RESOURCE_ORDER_SUFFIX, ".yy"];
        if SKIPPED_SUFFIXES
            .iter()
            .any(|suffix| entry_name.ends_with(suffix))
        {
            return false;
        }
        if is_project_folder(entry_name) {
            return false;
        }
        entry_path != self.source && Some(entry_path) != self.temp_source.as_deref()
    }
}
