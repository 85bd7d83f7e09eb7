//! Builder for executing external tool commands with timeout support.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Stderr lines kept for error messages when streaming.
const STDERR_TAIL_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// The last stderr lines, joined with newlines.
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use mm_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> mm_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .args(["-i", "input.mp4", "output.webm"])
///     .execute_with_stderr_callback(|line| println!("{line}"), None)
///     .await?;
/// assert!(output.status.success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            current_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Run the process with `dir` as its working directory.
    pub fn current_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Execute the command, handing every stderr line to `on_line` as it
    /// arrives.
    ///
    /// Stdout is discarded. When `cancel` fires the child is killed and
    /// [`mm_core::Error::Cancelled`] is returned.
    ///
    /// # Errors
    ///
    /// - [`mm_core::Error::Tool`] if spawning fails, the process times out
    ///   (message includes the timeout), or it exits non-zero (message
    ///   includes the stderr tail).
    /// - [`mm_core::Error::Cancelled`] when `cancel` fires.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str) + Send,
        cancel: Option<CancellationToken>,
    ) -> mm_core::Result<ToolOutput> {
        let program_name = self.program_name();
        let cancel = cancel.unwrap_or_default();

        let mut cmd = self.command();
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| mm_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| mm_core::Error::tool(&program_name, "failed to capture stderr"))?;
        let mut lines = BufReader::new(stderr).lines();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        on_line(&line);
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = child.kill().await;
                        return Err(mm_core::Error::tool(
                            program_name,
                            format!("failed to read stderr: {e}"),
                        ));
                    }
                },
                _ = cancel.cancelled() => {
                    tracing::debug!("{program_name} cancelled; killing child");
                    let _ = child.kill().await;
                    return Err(mm_core::Error::Cancelled);
                }
                _ = &mut deadline => {
                    let _ = child.kill().await;
                    return Err(mm_core::Error::tool(
                        program_name,
                        format!("timed out after {:?}", self.timeout),
                    ));
                }
            }
        }

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };
        let Some(status) = waited else {
            let _ = child.kill().await;
            return Err(mm_core::Error::Cancelled);
        };
        let status = status.map_err(|e| {
            mm_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;

        let stderr = tail.into_iter().collect::<Vec<_>>().join("\n");
        if !status.success() {
            return Err(mm_core::Error::tool(
                program_name,
                format!("exited with status {status}: {}", stderr.trim()),
            ));
        }

        Ok(ToolOutput { status, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nonexistent_tool_is_a_spawn_error() {
        let err = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute_with_stderr_callback(|_| {}, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to spawn"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_fires() {
        // `sleep 10` should be killed well before 10 seconds.
        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute_with_stderr_callback(|_| {}, None)
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_lines_are_streamed() {
        let mut seen = Vec::new();
        let result = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo one 1>&2; echo two 1>&2"])
            .execute_with_stderr_callback(|line| seen.push(line.to_string()), None)
            .await
            .unwrap();
        assert_eq!(seen, vec!["one", "two"]);
        assert_eq!(result.stderr, "one\ntwo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streaming_failure_reports_tail() {
        let err = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo broken 1>&2; exit 3"])
            .execute_with_stderr_callback(|_| {}, None)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("broken"), "unexpected error: {msg}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_kills_child() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .execute_with_stderr_callback(|_| {}, Some(token))
            .await
            .unwrap_err();
        assert!(err.is_cancelled(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn current_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut seen = Vec::new();
        ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "pwd 1>&2"])
            .current_dir(dir.path())
            .execute_with_stderr_callback(|line| seen.push(line.to_string()), None)
            .await
            .unwrap();
        let reported = std::fs::canonicalize(seen[0].trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
