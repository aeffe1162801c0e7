//! Child process execution with timeouts and bounded output capture.
//!
//! Every external command the sequencer runs goes through [`CommandRunner`],
//! so steps execute with an explicit, bounded environment and tests can
//! script command behavior without spawning anything.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Captured result of one command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded beyond the capture limit (pipes are still drained).
    pub truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// First non-empty stdout line, trimmed. Used for version strings.
    pub fn first_line(&self) -> Option<String> {
        self.stdout_text()
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// Abstraction over command lookup and execution.
pub trait CommandRunner {
    /// Resolve a program on `PATH`. Returns `None` when absent.
    fn lookup(&self, program: &str) -> Option<PathBuf>;

    /// Run `program args...` to completion. `Err` means the command could
    /// not be executed at all; a command that ran and exited non-zero is
    /// `Ok` with `success == false`.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Real runner that spawns processes with a wall-clock timeout.
pub struct SystemCommandRunner {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }
}

impl CommandRunner for SystemCommandRunner {
    fn lookup(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        run_command(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run {program}"))
    }
}

/// Run a command to completion, killing it after `timeout`.
///
/// stdout/stderr are drained concurrently to avoid pipe deadlocks; at most
/// `output_limit_bytes` of each stream is kept in memory.
pub fn run_command(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(command = ?cmd, "spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_handle).context("join stderr")?;
    let truncated = stdout_dropped + stderr_dropped;
    if truncated > 0 {
        warn!(truncated, "command output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        success: status.success() && !timed_out,
        exit_code: status.code(),
        stdout,
        stderr,
        truncated,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            dropped += n - keep;
        } else {
            dropped += n;
        }
    }

    Ok((buf, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> SystemCommandRunner {
        SystemCommandRunner::new(Duration::from_secs(5), 64 * 1024)
    }

    #[test]
    fn captures_stdout_and_exit_status() {
        let output = runner().run("sh", &["-c", "echo hello"]).expect("run");
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.first_line().as_deref(), Some("hello"));
    }

    #[test]
    fn nonzero_exit_is_ok_but_unsuccessful() {
        let output = runner().run("sh", &["-c", "exit 3"]).expect("run");
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = runner()
            .run("definitely-not-a-real-binary-1234", &[])
            .unwrap_err();
        assert!(err.to_string().contains("definitely-not-a-real-binary"));
    }

    #[test]
    fn timeout_kills_the_child() {
        let slow = SystemCommandRunner::new(Duration::from_millis(100), 1024);
        let output = slow.run("sh", &["-c", "sleep 5"]).expect("run");
        assert!(output.timed_out);
        assert!(!output.success);
    }

    #[test]
    fn output_is_bounded() {
        let tiny = SystemCommandRunner::new(Duration::from_secs(5), 16);
        let output = tiny
            .run("sh", &["-c", "printf '%01024d' 0"])
            .expect("run");
        assert_eq!(output.stdout.len(), 16);
        assert!(output.truncated > 0);
    }

    #[test]
    fn lookup_finds_sh_but_not_garbage() {
        let runner = runner();
        assert!(runner.lookup("sh").is_some());
        assert!(runner.lookup("definitely-not-a-real-binary-1234").is_none());
    }
}
