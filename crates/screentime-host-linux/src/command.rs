//! External command execution

use screentime_host_api::{HostError, HostResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Upper bound on how long a host command may run
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `argv` to completion, capturing output.
///
/// A non-zero exit is not an error here; callers decide via `success`.
pub async fn run_command(argv: &[String], envs: &[(&str, &str)]) -> HostResult<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| HostError::Internal("Empty argv".into()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(COMMAND_TIMEOUT, cmd.output())
        .await
        .map_err(|_| HostError::command(program, format!("timed out after {:?}", COMMAND_TIMEOUT)))?
        .map_err(|e| HostError::command(program, e.to_string()))?;

    let result = CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    debug!(program = %program, code = ?result.code, "Command finished");
    Ok(result)
}

/// Run `argv` and turn a non-zero exit into an error.
pub async fn run_checked(argv: &[String], envs: &[(&str, &str)]) -> HostResult<CommandOutput> {
    let output = run_command(argv, envs).await?;
    if output.success {
        return Ok(output);
    }

    let program = argv.first().map(String::as_str).unwrap_or_default();
    let detail = output.stderr.trim();
    Err(HostError::command(
        program,
        match output.code {
            Some(code) if detail.is_empty() => format!("exit code {}", code),
            Some(code) => format!("exit code {}: {}", code, detail),
            None => "terminated by signal".to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout() {
        let output = run_command(&argv(&["echo", "hello"]), &[]).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn passes_environment() {
        let output = run_command(
            &argv(&["sh", "-c", "printf %s \"$SCREENTIME_USER\""]),
            &[("SCREENTIME_USER", "kid")],
        )
        .await
        .unwrap();
        assert_eq!(output.stdout, "kid");
    }

    #[tokio::test]
    async fn checked_reports_exit_code() {
        let err = run_checked(&argv(&["sh", "-c", "echo nope >&2; exit 3"]), &[])
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exit code 3"), "{message}");
        assert!(message.contains("nope"), "{message}");
    }

    #[tokio::test]
    async fn missing_program_is_error() {
        let result = run_command(&argv(&["/nonexistent/screentime-test-binary"]), &[]).await;
        assert!(matches!(result, Err(HostError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn empty_argv_is_error() {
        assert!(run_command(&[], &[]).await.is_err());
    }
}
