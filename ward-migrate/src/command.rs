//! External command execution with a hard timeout.
//!
//! Every failure mode of a subprocess (spawn error, non-zero exit, timeout)
//! is reported as a [`CommandResult`] rather than an error, leaving the
//! interpretation to the caller.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Default wall-clock limit for a single external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    /// Program name or path.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl ExternalCommand {
    /// Create a new command.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Outcome of one external command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process was killed for exceeding its deadline.
    pub timed_out: bool,
}

impl CommandResult {
    /// A successful result with the given output.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// A failed result with the given standard error.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// A result for a process that was terminated after `timeout`.
    pub fn timed_out(command: &ExternalCommand, timeout: Duration) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: format!("`{}` timed out after {}s", command, timeout.as_secs()),
            timed_out: true,
        }
    }

    /// Standard error followed by standard output, for diagnostics.
    pub fn combined_output(&self) -> String {
        let mut out = self.stderr.trim().to_string();
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(stdout);
        }
        out
    }
}

/// Runs external commands on behalf of the engine.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion or until the runner's deadline.
    async fn run(&self, command: &ExternalCommand) -> CommandResult;
}

/// Runs commands as child processes rooted at the project directory.
///
/// On unix the child runs in its own process group; a timeout kills the
/// whole group and reaps the child before returning. `kill_on_drop` covers
/// a caller abandoning the run.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    cwd: PathBuf,
    timeout: Duration,
}

impl ProcessRunner {
    /// Create a runner for the given working directory.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-command timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &ExternalCommand) -> CommandResult {
        debug!(command = %command, cwd = %self.cwd.display(), "spawning external command");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down everything the command started.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return CommandResult::failed(format!("failed to spawn `{}`: {}", command, e)),
        };

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let collected = tokio::time::timeout(self.timeout, async {
            let (status, out, err) = tokio::join!(
                child.wait(),
                read_pipe(stdout.as_mut()),
                read_pipe(stderr.as_mut())
            );
            status.map(|status| (status, out, err))
        })
        .await;

        match collected {
            Ok(Ok((status, stdout, stderr))) => {
                debug!(command = %command, status = %status, "external command exited");
                CommandResult {
                    success: status.success(),
                    stdout,
                    stderr,
                    timed_out: false,
                }
            }
            Ok(Err(e)) => CommandResult::failed(format!("failed to wait for `{}`: {}", command, e)),
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "external command timed out");
                terminate(&mut child).await;
                CommandResult::timed_out(command, self.timeout)
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<&mut R>) -> String {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!(error = %e, "failed to read child output");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Kill the child's whole process group, then kill and reap the child itself.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // The child leads its own group and is not reaped yet, so the id still names that group.
            let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
            if rc != 0 {
                debug!(pid, error = %std::io::Error::last_os_error(), "killpg failed");
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!(error = %e, "failed to kill timed out child");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display() {
        let cmd = ExternalCommand::new("npx", ["drizzle-kit", "generate"]);
        assert_eq!(cmd.to_string(), "npx drizzle-kit generate");
    }

    #[test]
    fn test_combined_output() {
        let result = CommandResult {
            success: false,
            stdout: "partial\n".to_string(),
            stderr: "boom\n".to_string(),
            timed_out: false,
        };
        assert_eq!(result.combined_output(), "boom\npartial");
        assert_eq!(CommandResult::ok("only").combined_output(), "only");
    }

    #[tokio::test]
    async fn test_missing_program_is_not_an_error() {
        let runner = ProcessRunner::new(std::env::temp_dir());
        let result = runner
            .run(&ExternalCommand::new("ward-definitely-not-a-real-binary", Vec::<String>::new()))
            .await;
        assert!(!result.success);
        assert!(!result.timed_out);
        assert!(result.stderr.contains("failed to spawn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_in_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let runner = ProcessRunner::new(dir.path());
        let result = runner
            .run(&ExternalCommand::new("sh", ["-c", "cat marker.txt; echo oops >&2; exit 3"]))
            .await;

        assert!(!result.success);
        assert_eq!(result.stdout, "here");
        assert_eq!(result.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = ProcessRunner::new(std::env::temp_dir()).timeout(Duration::from_millis(200));
        let cmd = ExternalCommand::new("sleep", ["5"]);
        let result = runner.run(&cmd).await;

        assert!(!result.success);
        assert!(result.timed_out);
        assert!(result.stderr.contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(dir.path()).timeout(Duration::from_millis(300));
        let cmd = ExternalCommand::new("sh", ["-c", "(sleep 1; touch survived) & wait"]);

        let result = runner.run(&cmd).await;
        assert!(result.timed_out);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("survived").exists(), "background work outlived the timeout");
    }
}
