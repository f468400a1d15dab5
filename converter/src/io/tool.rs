//! Invocation of the external GameMaker `ProjectTool` converter.
//!
//! The [`ProjectTool`] trait decouples the staging logic from the real
//! executable. Tests use scripted tools that fake the output layout without
//! spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::io::process::{ChildOutput, command_line, run_with_deadline};

/// Stdout substring that marks a successful conversion.
pub const DEFAULT_SUCCESS_MARKER: &str = "ProjectTool Successful";

/// Parameters for one `PROJECT SAVE` invocation.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Project or package handed to the tool.
    pub source: PathBuf,
    /// Output `.yyp` path or output folder.
    pub destination: PathBuf,
    pub prefabs_folder: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    /// Where to write the captured stdout/stderr, if anywhere.
    pub log_path: Option<PathBuf>,
}

/// What the tool printed and how it ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ToolOutput {
    /// Success is decided by the stdout marker alone; the tool's exit code is
    /// not reliable and is only logged.
    pub fn succeeded(&self, marker: &str) -> bool {
        !self.timed_out && self.stdout.contains(marker)
    }
}

/// Abstraction over the conversion backend.
pub trait ProjectTool: Sync {
    /// Run one conversion. An `Err` means the tool could not be run at all.
    fn save(&self, request: &SaveRequest) -> Result<ToolOutput>;

    /// Stdout marker that [`ToolOutput::succeeded`] looks for.
    fn success_marker(&self) -> &str {
        DEFAULT_SUCCESS_MARKER
    }
}

/// Arguments for `ProjectTool.exe PROJECT SAVE`.
pub fn save_args(request: &SaveRequest) -> Vec<String> {
    vec![
        "PROJECT".to_string(),
        "SAVE".to_string(),
        format!("SOURCE={}", request.source.display()),
        format!("DESTINATION={}", request.destination.display()),
        format!("PREFABSFOLDER={}", request.prefabs_folder.display()),
        "FORMAT=VERSIONED".to_string(),
        "CLEANUP=TRUE".to_string(),
    ]
}

/// The real `ProjectTool` executable.
#[derive(Debug, Clone)]
pub struct ProjectToolExe {
    pub path: PathBuf,
    pub success_marker: String,
}

impl ProjectToolExe {
    pub fn new(path: impl Into<PathBuf>, success_marker: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            success_marker: success_marker.into(),
        }
    }
}

impl ProjectTool for ProjectToolExe {
    #[instrument(skip_all, fields(source = %request.source.display()))]
    fn save(&self, request: &SaveRequest) -> Result<ToolOutput> {
        let mut cmd = Command::new(&self.path);
        cmd.args(save_args(request));
        hide_console_window(&mut cmd);

        info!(command = %command_line(&cmd), "running ProjectTool");
        let output = run_with_deadline(cmd, request.timeout, request.output_limit_bytes)
            .context("run ProjectTool")?;

        if let Some(log_path) = &request.log_path {
            write_tool_log(log_path, &output)?;
        }

        let result = ToolOutput {
            stdout: output.stdout.text(),
            stderr: output.stderr.text(),
            exit_code: output.status.code(),
            timed_out: output.timed_out,
        };
        info!(stdout = %result.stdout.trim_end(), "SAVE stdout");
        info!(stderr = %result.stderr.trim_end(), "SAVE stderr");
        if result.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "ProjectTool timed out");
        }
        debug!(exit_code = ?result.exit_code, "ProjectTool finished");
        Ok(result)
    }

    fn success_marker(&self) -> &str {
        &self.success_marker
    }
}

#[cfg(windows)]
fn hide_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_cmd: &mut Command) {}

fn write_tool_log(path: &Path, output: &ChildOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create tool log dir {}", parent.display()))?;
    }
    let mut buf = output.stdout.log_section("stdout");
    buf.push('\n');
    buf.push_str(&output.stderr.log_section("stderr"));
    if output.timed_out {
        buf.push_str("\n[ProjectTool timed out]\n");
    }
    buf.push_str(&format!(
        "\n[exit code {:?} after {} ms]\n",
        output.status.code(),
        output.elapsed.as_millis()
    ));
    fs::write(path, buf).with_context(|| format!("write tool log {}", path.display()))
}

/// Run the tool and decide success, treating a failure to run as an
/// unsuccessful conversion with the error as the reason.
pub fn run_save<T: ProjectTool + ?Sized>(
    tool: &T,
    request: &SaveRequest,
) -> std::result::Result<ToolOutput, String> {
    match tool.save(request) {
        Ok(output) if output.succeeded(tool.success_marker()) => Ok(output),
        Ok(output) if output.timed_out => Err("ProjectTool timed out".to_string()),
        Ok(output) => {
            warn!(stdout = %output.stdout.trim_end(), "Saving project failed");
            Err("ProjectTool output did not report success".to_string())
        }
        Err(err) => Err(format!("{err:#}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(root: &Path) -> SaveRequest {
        SaveRequest {
            source: root.join("Maze.yyz"),
            destination: root.join("Maze"),
            prefabs_folder: root.join("Prefabs"),
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
            log_path: None,
        }
    }

    struct FixedTool(std::result::Result<ToolOutput, String>);

    impl ProjectTool for FixedTool {
        fn save(&self, _request: &SaveRequest) -> Result<ToolOutput> {
            self.0.clone().map_err(anyhow::Error::msg)
        }
    }

    #[test]
    fn save_args_follow_project_save_contract() {
        let req = request(Path::new("/games"));
        assert_eq!(
            save_args(&req),
            vec![
                "PROJECT",
                "SAVE",
                "SOURCE=/games/Maze.yyz",
                "DESTINATION=/games/Maze",
                "PREFABSFOLDER=/games/Prefabs",
                "FORMAT=VERSIONED",
                "CLEANUP=TRUE",
            ]
        );
    }

    #[test]
    fn success_requires_marker_in_stdout() {
        let ok = ToolOutput {
            stdout: "Loading...\nProjectTool Successful\n".to_string(),
            ..ToolOutput::default()
        };
        assert!(ok.succeeded(DEFAULT_SUCCESS_MARKER));

        let in_stderr = ToolOutput {
            stderr: "ProjectTool Successful".to_string(),
            exit_code: Some(0),
            ..ToolOutput::default()
        };
        assert!(!in_stderr.succeeded(DEFAULT_SUCCESS_MARKER));

        let timed_out = ToolOutput {
            stdout: "ProjectTool Successful".to_string(),
            timed_out: true,
            ..ToolOutput::default()
        };
        assert!(!timed_out.succeeded(DEFAULT_SUCCESS_MARKER));
    }

    #[test]
    fn run_save_maps_spawn_errors_to_reason() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tool = FixedTool(Err("spawn ProjectTool.exe".to_string()));
        let reason = run_save(&tool, &request(temp.path())).unwrap_err();
        assert!(reason.contains("spawn"));
    }

    #[test]
    fn run_save_rejects_output_without_marker() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tool = FixedTool(Ok(ToolOutput {
            stdout: "ProjectTool Failed".to_string(),
            exit_code: Some(0),
            ..ToolOutput::default()
        }));
        let reason = run_save(&tool, &request(temp.path())).unwrap_err();
        assert!(reason.contains("did not report success"));
    }

    #[cfg(unix)]
    #[test]
    fn exe_writes_tool_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tool = ProjectToolExe::new("echo", DEFAULT_SUCCESS_MARKER);
        let mut req = request(temp.path());
        req.log_path = Some(temp.path().join("logs").join("tool.log"));

        let output = tool.save(&req).expect("save");
        assert!(output.stdout.starts_with("PROJECT SAVE SOURCE="));
        assert!(!output.succeeded(tool.success_marker()));

        let log = fs::read_to_string(temp.path().join("logs/tool.log")).expect("read log");
        assert!(log.contains("=== stdout ===\nPROJECT SAVE"));
    }
}
