//! # External Tool Execution
//!
//! Runs `kubectl` and `kubeseal` as child processes.
//!
//! Content is piped to the child's stdin and collected from stdout; stderr is
//! captured for diagnostics. Every run is bounded by a timeout and the child is
//! killed when the timeout fires.

use crate::constants::MAX_TOOL_STDERR_CHARS;
use crate::observability::metrics;
use std::ffi::OsString;
use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, warn, Instrument};

/// Outcome of a failed tool run
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary could not be resolved or spawned
    #[error("{tool} is unavailable: {reason}")]
    Unavailable { tool: String, reason: String },
    /// The tool ran and exited unsuccessfully
    #[error("{tool} exited with code {}: {stderr}", describe_exit_code(.exit_code))]
    Failed {
        tool: String,
        /// `None` when the process was terminated by a signal
        exit_code: Option<i32>,
        stderr: String,
    },
    /// The tool did not finish in time and was killed
    #[error("{tool} timed out after {timeout:?}")]
    TimedOut { tool: String, timeout: Duration },
    /// Talking to the child process failed
    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Render an exit code, `none` when the process was killed by a signal
#[allow(clippy::ref_option, reason = "Called from thiserror format args, which bind fields by reference")]
pub fn describe_exit_code(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(|| "none".to_string(), |code| code.to_string())
}

/// A single invocation of an external tool
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Short name used in logs, metrics and errors (e.g. `kubectl`)
    pub tool: &'static str,
    /// Binary name or path; bare names are resolved through `PATH`
    pub binary: String,
    pub args: Vec<OsString>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(tool: &'static str, binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tool,
            binary: binary.into(),
            args: Vec::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Run the tool, optionally feeding `stdin`, and return its stdout
    pub async fn run(&self, stdin: Option<&[u8]>) -> Result<Vec<u8>, ToolError> {
        let span = info_span!("tool.run", tool = self.tool, timeout_secs = self.timeout.as_secs());
        let start = Instant::now();

        async move {
            let result = self.run_inner(stdin).await;
            metrics::observe_tool_duration(self.tool, start.elapsed().as_secs_f64());
            if let Err(e) = &result {
                warn!("{} failed after {}ms: {}", self.tool, start.elapsed().as_millis(), e);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_inner(&self, stdin: Option<&[u8]>) -> Result<Vec<u8>, ToolError> {
        let binary_path = which::which(&self.binary).map_err(|e| ToolError::Unavailable {
            tool: self.tool.to_string(),
            reason: format!("{} not found in PATH: {e}", self.binary),
        })?;

        debug!("Using {} binary at: {:?}", self.tool, binary_path);

        let mut cmd = tokio::process::Command::new(binary_path);
        cmd.args(&self.args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ToolError::Unavailable {
            tool: self.tool.to_string(),
            reason: format!("failed to spawn: {e}"),
        })?;

        let io_error = |source: io::Error| ToolError::Io {
            tool: self.tool.to_string(),
            source,
        };

        let pipe = child.stdin.take();
        let tool = self.tool;

        // Stdin is fed while stdout/stderr are drained, so a tool that exits
        // without reading its input still reports its own exit status
        let feed = async move {
            let (Some(input), Some(mut pipe)) = (stdin, pipe) else {
                return Ok(());
            };
            let written: io::Result<()> = async {
                pipe.write_all(input).await?;
                pipe.shutdown().await
            }
            .await;
            match written {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("{} closed stdin before reading all input", tool);
                    Ok(())
                }
                other => other,
            }
        };

        // Dropping the interaction future on timeout drops the child, which kills it
        let (fed, output) = tokio::time::timeout(self.timeout, async {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_elapsed| ToolError::TimedOut {
            tool: self.tool.to_string(),
            timeout: self.timeout,
        })?;
        let output = output.map_err(io_error)?;

        if output.status.success() {
            fed.map_err(io_error)?;
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ToolError::Failed {
            tool: self.tool.to_string(),
            exit_code: output.status.code(),
            stderr: truncate_diagnostic(stderr.trim()),
        })
    }
}

/// Truncate tool diagnostics before they reach users
pub(crate) fn truncate_diagnostic(message: &str) -> String {
    if message.chars().count() > MAX_TOOL_STDERR_CHARS {
        let truncated: String = message.chars().take(MAX_TOOL_STDERR_CHARS).collect();
        format!("{truncated}... (truncated, see logs for full error)")
    } else {
        message.to_string()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> ToolInvocation {
        ToolInvocation::new("sh", "sh", timeout).arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_run_pipes_stdin_to_stdout() {
        let out = sh("cat", Duration::from_secs(5))
            .run(Some(b"kind: Secret\n"))
            .await
            .expect("cat should succeed");
        assert_eq!(out, b"kind: Secret\n");
    }

    #[tokio::test]
    async fn test_run_reports_exit_code_and_stderr() {
        let err = sh("echo 'no key available' >&2; exit 3", Duration::from_secs(5))
            .run(None)
            .await
            .expect_err("non-zero exit must fail");
        match err {
            ToolError::Failed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "no key available");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let err = sh("sleep 5", Duration::from_millis(100))
            .run(None)
            .await
            .expect_err("sleep must time out");
        assert!(matches!(err, ToolError::TimedOut { .. }));
        assert_eq!(err.to_string(), "sh timed out after 100ms");
    }

    #[tokio::test]
    async fn test_run_reports_exit_when_tool_ignores_stdin() {
        let input = vec![b'a'; 1024 * 1024];
        let err = sh("echo 'cannot fetch certificate' >&2; exit 1", Duration::from_secs(10))
            .run(Some(&input))
            .await
            .expect_err("non-zero exit must fail");
        match err {
            ToolError::Failed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr, "cannot fetch certificate");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_succeeds_when_tool_ignores_stdin() {
        let input = vec![b'a'; 1024 * 1024];
        let out = sh("echo sealed", Duration::from_secs(10))
            .run(Some(&input))
            .await
            .expect("exit status decides the outcome");
        assert_eq!(out, b"sealed\n");
    }

    #[tokio::test]
    async fn test_run_missing_binary_is_unavailable() {
        let err = ToolInvocation::new("kubeseal", "definitely-not-a-real-binary-4711", Duration::from_secs(1))
            .run(None)
            .await
            .expect_err("missing binary must fail");
        assert!(matches!(err, ToolError::Unavailable { .. }));
    }

    #[test]
    fn test_truncate_diagnostic() {
        let short = "short message";
        assert_eq!(truncate_diagnostic(short), short);

        let long = "x".repeat(MAX_TOOL_STDERR_CHARS + 10);
        let truncated = truncate_diagnostic(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_TOOL_STDERR_CHARS)));
        assert!(truncated.ends_with("(truncated, see logs for full error)"));
    }
}
