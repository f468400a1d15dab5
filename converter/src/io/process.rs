//! Running an external tool as a child process with a deadline.
//!
//! `ProjectTool` can print a lot and occasionally hangs on a bad project, so
//! both pipes are drained on reader threads, each stream is cut at a byte
//! limit, and the child is killed once the deadline passes.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// One output stream, cut at the capture limit.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    /// Bytes read past the limit and dropped.
    pub discarded: u64,
}

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// `=== name ===` header followed by the kept text, plus a note when
    /// anything was dropped.
    pub fn log_section(&self, name: &str) -> String {
        let mut section = format!("=== {name} ===\n{}", self.text());
        if self.discarded > 0 {
            section.push_str(&format!("\n[{name} truncated {} bytes]\n", self.discarded));
        }
        section
    }
}

/// How a child process ended and what it printed.
#[derive(Debug)]
pub struct ChildOutput {
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
    pub timed_out: bool,
    pub elapsed: Duration,
}

/// Program and arguments joined by spaces, for logs and error messages.
pub fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `cmd` with a null stdin until it exits or `deadline` passes.
///
/// At most `capture_limit` bytes of each stream are kept. A child still
/// running at the deadline is killed and reported with `timed_out` set.
#[instrument(skip_all, fields(deadline_secs = deadline.as_secs(), capture_limit))]
pub fn run_with_deadline(
    mut cmd: Command,
    deadline: Duration,
    capture_limit: usize,
) -> Result<ChildOutput> {
    let line = command_line(&cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let started = Instant::now();
    let mut child = cmd.spawn().with_context(|| format!("spawn {line}"))?;
    debug!(pid = child.id(), "child started");
    let stdout = spawn_reader(child.stdout.take(), "stdout", capture_limit)?;
    let stderr = spawn_reader(child.stderr.take(), "stderr", capture_limit)?;

    let waited = child
        .wait_timeout(deadline)
        .with_context(|| format!("wait for {line}"))?;
    let (status, timed_out) = match waited {
        Some(status) => (status, false),
        None => {
            warn!(command = %line, deadline_secs = deadline.as_secs(), "deadline passed, killing child");
            child.kill().with_context(|| format!("kill {line}"))?;
            let status = child
                .wait()
                .with_context(|| format!("wait for {line} after kill"))?;
            (status, true)
        }
    };

    let stdout = join_reader(stdout, "stdout")?;
    let stderr = join_reader(stderr, "stderr")?;
    if stdout.discarded > 0 || stderr.discarded > 0 {
        warn!(
            stdout_discarded = stdout.discarded,
            stderr_discarded = stderr.discarded,
            "child output cut at capture limit"
        );
    }

    let elapsed = started.elapsed();
    debug!(exit_code = ?status.code(), timed_out, elapsed_ms = elapsed.as_millis() as u64, "child finished");
    Ok(ChildOutput {
        status,
        stdout,
        stderr,
        timed_out,
        elapsed,
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: Option<R>,
    name: &str,
    limit: usize,
) -> Result<JoinHandle<io::Result<Captured>>> {
    let stream = stream.ok_or_else(|| anyhow!("{name} was not piped"))?;
    Ok(thread::spawn(move || capture(stream, limit)))
}

fn join_reader(handle: JoinHandle<io::Result<Captured>>, name: &str) -> Result<Captured> {
    handle
        .join()
        .map_err(|_| anyhow!("{name} reader panicked"))?
        .with_context(|| format!("read {name}"))
}

/// Keep the first `limit` bytes and count the rest while draining the pipe.
fn capture<R: Read>(mut reader: R, limit: usize) -> io::Result<Captured> {
    let mut bytes = Vec::new();
    reader.by_ref().take(limit as u64).read_to_end(&mut bytes)?;
    let discarded = io::copy(&mut reader, &mut io::sink())?;
    Ok(Captured { bytes, discarded })
}
