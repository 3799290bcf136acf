//! Subprocess execution with a hard timeout.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::GitError;

/// Upper bound for any single git invocation.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured result of one git invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Trimmed stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Run `program args...` in `cwd` and capture its output.
///
/// A non-zero exit is *not* an error here; callers inspect
/// [`GitOutput::success`]. The child is killed if `timeout` elapses.
pub async fn run(
    program: &OsStr,
    cwd: &Path,
    args: &[&str],
    env: &[(&str, &str)],
    timeout: Duration,
) -> Result<GitOutput, GitError> {
    let command_label = args.first().copied().unwrap_or_default().to_owned();

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .kill_on_drop(true);
    for (key, value) in env {
        command.env(key, value);
    }

    match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => Err(GitError::Timeout {
            command: command_label,
            timeout,
        }),
        Ok(Err(source)) => Err(GitError::Spawn {
            command: command_label,
            source,
        }),
        Ok(Ok(output)) => Ok(GitOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_prefers_stderr() {
        let out = GitOutput {
            code: Some(1),
            stdout: "nothing to commit\n".to_owned(),
            stderr: "  fatal: boom \n".to_owned(),
        };
        assert_eq!(out.diagnostic(), "fatal: boom");

        let out = GitOutput {
            stderr: "\n".to_owned(),
            ..out
        };
        assert_eq!(out.diagnostic(), "nothing to commit");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_reported_distinctly() {
        let err = run(
            OsStr::new("sleep"),
            Path::new("."),
            &["5"],
            &[],
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(&err, GitError::Timeout { command, .. } if command == "5"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = run(
            OsStr::new("gitmirror-definitely-not-a-binary"),
            Path::new("."),
            &["status"],
            &[],
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GitError::Spawn { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_exit_code_and_output() {
        let out = run(
            OsStr::new("sh"),
            Path::new("."),
            &["-c", "echo out; echo err >&2; exit 3"],
            &[],
            Duration::from_secs(5),
        )
        .await
        .expect("run");
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.diagnostic(), "err");
    }
}
