//! # External Process Runner
//!
//! Every external collaborator (ffprobe, ffmpeg, the generation client) is run
//! through [`ToolCommand`], which captures output and enforces a timeout so no
//! call can hang a job indefinitely.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{tail, ToolError, DIAGNOSTIC_TAIL_CHARS};

/// A single out-of-process invocation with a bounded timeout
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    envs: Vec<(String, OsString)>,
    timeout: Duration,
}

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolCommand {
    pub fn new<S: Into<String>>(program: S, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            timeout,
        }
    }

    pub fn arg<A: Into<OsString>>(mut self, arg: A) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env<K: Into<String>, V: Into<OsString>>(mut self, key: K, value: V) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arg_list(&self) -> &[OsString] {
        &self.args
    }

    /// Render the command line for logs
    pub fn display(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        format!("{} {}", self.program, args.join(" "))
    }

    /// Run to completion, killing the process if the timeout elapses
    pub async fn run(&self) -> std::result::Result<ToolOutput, ToolError> {
        debug!("Running: {}", self.display());

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound {
                program: self.program.clone(),
            },
            _ => ToolError::Io {
                program: self.program.clone(),
                source: e,
            },
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ToolError::Io {
                program: self.program.clone(),
                source: e,
            })?,
            Err(_) => {
                warn!("{} timed out after {}s", self.program, self.timeout.as_secs());
                return Err(ToolError::Timeout {
                    program: self.program.clone(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl ToolOutput {
    /// stdout and stderr joined, the way the generation client mixes them
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Last few hundred characters of the error output, for user-facing messages
    pub fn diagnostic_tail(&self) -> String {
        let source = if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        tail(source, DIAGNOSTIC_TAIL_CHARS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let result = ToolCommand::new("reel-studio-no-such-tool", Duration::from_secs(5))
            .run()
            .await;
        assert!(matches!(result, Err(ToolError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_typed() {
        let result = ToolCommand::new("sleep", Duration::from_millis(200))
            .arg("5")
            .run()
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_output_and_status() {
        let output = ToolCommand::new("sh", Duration::from_secs(5))
            .args(["-c", "echo hello; echo oops >&2; exit 3"])
            .run()
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.diagnostic_tail(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_is_passed() {
        let output = ToolCommand::new("sh", Duration::from_secs(5))
            .args(["-c", "echo $REEL_TEST_VAR"])
            .env("REEL_TEST_VAR", "present")
            .run()
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "present");
    }

    #[test]
    fn test_display_renders_args() {
        let cmd = ToolCommand::new("ffmpeg", Duration::from_secs(1)).args(["-y", "-i", "in.mp4"]);
        assert_eq!(cmd.display(), "ffmpeg -y -i in.mp4");
    }
}
