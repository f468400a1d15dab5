//! Test-only helpers: a scripted conversion tool and project layout builders.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::core::naming::ProjectName;
use crate::io::tool::{DEFAULT_SUCCESS_MARKER, ProjectTool, SaveRequest, ToolOutput};

/// How the scripted tool answers one `save` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Write a plausible converted layout and print the success marker.
    Succeed,
    /// Print the success marker but write nothing.
    SucceedWithoutOutput,
    /// Print a failure message and write nothing.
    Fail,
    /// Write part of the output, then print a failure message.
    FailWithPartialOutput,
    /// Behave like an executable that cannot be started.
    SpawnError,
}

/// Fake `ProjectTool` that records requests and fakes the output layout.
#[derive(Debug)]
pub struct ScriptedTool {
    default: ScriptedOutcome,
    overrides: Vec<(String, ScriptedOutcome)>,
    calls: Mutex<Vec<SaveRequest>>,
}

impl ScriptedTool {
    pub fn new(default: ScriptedOutcome) -> Self {
        Self {
            default,
            overrides: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Use `outcome` for sources whose path contains `needle`.
    pub fn with_override(mut self, needle: &str, outcome: ScriptedOutcome) -> Self {
        self.overrides.push((needle.to_string(), outcome));
        self
    }

    /// Requests seen so far, in call order.
    pub fn calls(&self) -> Vec<SaveRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn outcome_for(&self, source: &Path) -> ScriptedOutcome {
        let source = source.to_string_lossy();
        self.overrides
            .iter()
            .find(|(needle, _)| source.contains(needle.as_str()))
            .map_or(self.default, |(_, outcome)| *outcome)
    }
}

impl ProjectTool for ScriptedTool {
    fn save(&self, request: &SaveRequest) -> Result<ToolOutput> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match self.outcome_for(&request.source) {
            ScriptedOutcome::SpawnError => Err(anyhow!("spawn scripted ProjectTool")),
            ScriptedOutcome::Fail => Ok(failed_output()),
            ScriptedOutcome::SucceedWithoutOutput => Ok(succeeded_output()),
            ScriptedOutcome::FailWithPartialOutput => {
                write_partial_output(&request.destination)?;
                Ok(failed_output())
            }
            ScriptedOutcome::Succeed => {
                if !request.source.is_file() {
                    return Ok(ToolOutput {
                        stdout: format!("Cannot open {}\n", request.source.display()),
                        exit_code: Some(1),
                        ..ToolOutput::default()
                    });
                }
                write_converted_layout(request)?;
                Ok(succeeded_output())
            }
        }
    }
}

fn succeeded_output() -> ToolOutput {
    ToolOutput {
        stdout: format!("Loading project\n{DEFAULT_SUCCESS_MARKER}\n"),
        exit_code: Some(0),
        ..ToolOutput::default()
    }
}

fn failed_output() -> ToolOutput {
    ToolOutput {
        stdout: "ProjectTool Failed\n".to_string(),
        exit_code: Some(0),
        ..ToolOutput::default()
    }
}

/// Only the destination itself: a truncated `.yyp` or an empty folder.
fn write_partial_output(destination: &Path) -> Result<()> {
    if destination.extension().is_some_and(|ext| ext == "yyp") {
        fs::write(destination, "{").with_context(|| format!("write {}", destination.display()))
    } else {
        fs::create_dir_all(destination).with_context(|| format!("create {}", destination.display()))
    }
}

/// A `.yyp` destination gets the file plus `options`/`options_dir` beside it.
/// A folder destination gets the folder, a `.yyp` named after the source and
/// an `options` folder.
fn write_converted_layout(request: &SaveRequest) -> Result<()> {
    let destination = &request.destination;
    let project_dir = if destination.extension().is_some_and(|ext| ext == "yyp") {
        let dir = destination
            .parent()
            .ok_or_else(|| anyhow!("destination has no parent"))?;
        fs::create_dir_all(dir.join("options").join("windows"))?;
        fs::create_dir_all(dir.join("options_dir"))?;
        fs::write(destination, "{\"resourceType\":\"GMProject\"}\n")
            .with_context(|| format!("write {}", destination.display()))?;
        dir.to_path_buf()
    } else {
        let source_name = request
            .source
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(ProjectName::parse)
            .ok_or_else(|| anyhow!("unexpected source {}", request.source.display()))?;
        fs::create_dir_all(destination.join("options").join("windows"))?;
        fs::write(
            destination.join(source_name.converted_file_name()),
            "{\"resourceType\":\"GMProject\"}\n",
        )?;
        destination.clone()
    };
    fs::create_dir_all(project_dir.join("objects").join("obj_player"))?;
    Ok(())
}

/// Temporary directory holding a project layout.
pub struct TestProject {
    temp: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir().context("create temp dir")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write a file (creating parents) and return its path.
    pub fn file(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Create a directory (and parents) and return its path.
    pub fn dir(&self, relative: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))?;
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path().join(relative);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Sorted relative paths of everything in the project, `/`-separated,
    /// directories with a trailing `/`.
    pub fn snapshot(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(self.path()).min_depth(1) {
            let entry = entry.context("walk test project")?;
            let relative = entry
                .path()
                .strip_prefix(self.path())
                .context("relativize")?
                .components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if entry.file_type().is_dir() {
                paths.push(format!("{relative}/"));
            } else {
                paths.push(relative);
            }
        }
        paths.sort();
        Ok(paths)
    }
}
