//! Subprocess execution for lifecycle hook commands and the container
//! runtime adapter.
//!
//! Every lifecycle command eventually runs through
//! [`run_command_with_timeout`], which also honors a [`CancellationToken`]:
//! on cancel or timeout the child receives `SIGTERM`, then `SIGKILL` if it
//! hasn't exited after a grace period.

use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default grace period between `SIGTERM` and `SIGKILL` on cancellation.
pub const DEFAULT_KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Shared cancellation flag. Cloning shares the same underlying flag, so a
/// single token can be propagated into every in-flight subprocess.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn ok(&self) -> Result<&Self> {
        if self.success {
            Ok(self)
        } else {
            Err(anyhow::anyhow!(
                "command failed with exit code {:?}: {}",
                self.exit_code,
                self.stderr
            ))
        }
    }

    pub fn from_output(output: &Output, duration: Duration) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Result of a command run with timeout/cancellation bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub cancelled: bool,
    pub duration: Duration,
}

pub fn run_command(program: &str, args: &[&str]) -> Result<CommandResult> {
    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run command: {program} {args:?}"))?;
    Ok(CommandResult::from_output(&output, start.elapsed()))
}

pub fn run_command_in_dir(
    program: &str,
    args: &[&str],
    dir: &std::path::Path,
) -> Result<CommandResult> {
    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| {
            format!(
                "failed to run command: {program} {args:?} in {}",
                dir.display()
            )
        })?;
    Ok(CommandResult::from_output(&output, start.elapsed()))
}

pub fn run_command_with_env(
    program: &str,
    args: &[&str],
    env: &[(String, String)],
    dir: &std::path::Path,
) -> Result<CommandResult> {
    let start = Instant::now();
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(dir);
    for (key, value) in env {
        cmd.env(key, value);
    }
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {program} {args:?}"))?;
    Ok(CommandResult::from_output(&output, start.elapsed()))
}

/// Run a command with an optional timeout and an optional cancellation
/// token. On timeout or cancellation the child is sent `SIGTERM`; if it
/// hasn't exited after `grace_period`, it is forcibly killed.
pub fn run_command_with_timeout(
    program: &str,
    args: &[&str],
    working_dir: &std::path::Path,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
    grace_period: Duration,
) -> Result<CommandOutput> {
    let start = Instant::now();

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn command: {program}"))?;

    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to poll command: {program}"))?
        {
            return Ok(CommandOutput {
                exit_code: status.code().unwrap_or(-1),
                stdout: read_pipe(child.stdout.take()),
                stderr: read_pipe(child.stderr.take()),
                timed_out: false,
                cancelled: false,
                duration: start.elapsed(),
            });
        }

        let cancelled = cancel.map(|c| c.is_cancelled()).unwrap_or(false);
        let timed_out = deadline.map(|d| Instant::now() >= d).unwrap_or(false);

        if cancelled || timed_out {
            terminate(&mut child, grace_period);
            let mut stderr = read_pipe(child.stderr.take());
            if timed_out {
                stderr.push_str(&format!(
                    "\n{program} timed out after {}",
                    timeout.map(humantime::format_duration).unwrap()
                ));
            }
            return Ok(CommandOutput {
                exit_code: -1,
                stdout: read_pipe(child.stdout.take()),
                stderr,
                timed_out,
                cancelled,
                duration: start.elapsed(),
            });
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

/// `SIGTERM`, then `SIGKILL` after `grace_period` if the child is still alive.
fn terminate(child: &mut Child, grace_period: Duration) {
    send_sigterm(child);

    let deadline = Instant::now() + grace_period;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn send_sigterm(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) {
    let _ = child.kill();
}

fn read_pipe<R: Read>(stream: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut s) = stream {
        let _ = s.read_to_end(&mut buffer);
    }
    String::from_utf8_lossy(&buffer).to_string()
}

pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

pub fn which(program: &str) -> Option<std::path::PathBuf> {
    which::which(program).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_captures_stdout() {
        let result = run_command("echo", &["hello"]).expect("run");
        assert!(result.success);
        assert!(result.stdout.contains("hello"));
    }

    #[test]
    fn run_command_failure_is_reported() {
        let result = run_command("false", &[]).expect("run");
        assert!(!result.success);
        assert!(result.ok().is_err());
    }

    #[test]
    fn command_exists_for_a_real_binary() {
        assert!(command_exists("sh"));
        assert!(!command_exists("this-command-does-not-exist-xyz123"));
    }

    #[test]
    fn cancellation_token_reports_state() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn run_command_with_timeout_completes_normally() {
        let dir = std::env::temp_dir();
        let out = run_command_with_timeout(
            "echo",
            &["done"],
            &dir,
            Some(Duration::from_secs(5)),
            None,
            DEFAULT_KILL_GRACE_PERIOD,
        )
        .expect("run");
        assert!(!out.timed_out);
        assert!(!out.cancelled);
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("done"));
    }

    #[test]
    fn run_command_with_timeout_kills_on_deadline() {
        let dir = std::env::temp_dir();
        let out = run_command_with_timeout(
            "sleep",
            &["5"],
            &dir,
            Some(Duration::from_millis(200)),
            None,
            Duration::from_millis(100),
        )
        .expect("run");
        assert!(out.timed_out);
        assert!(!out.cancelled);
    }

    #[test]
    fn run_command_with_timeout_honors_cancellation_token() {
        let dir = std::env::temp_dir();
        let token = CancellationToken::new();
        token.cancel();
        let out = run_command_with_timeout(
            "sleep",
            &["5"],
            &dir,
            None,
            Some(&token),
            Duration::from_millis(100),
        )
        .expect("run");
        assert!(out.cancelled);
    }
}
