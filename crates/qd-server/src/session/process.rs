//! Process supervision
//!
//! Creates the one OS process a session runs and wires its standard
//! streams: either three independent pipes (`exec`) or a terminal device
//! (`shell`, see [`Terminal::spawn`](super::pty::Terminal::spawn)).

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use portable_pty::CommandBuilder;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;

use qd_core::config::SessionConfig;
use qd_core::error::SessionError;
use qd_core::ChannelSink;
use qd_protocol::ExitCode;

use super::bridge;

/// How long output is still forwarded after a command has exited
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Program, arguments and extra environment of a process to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program name or path, resolved through `PATH`
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Environment variables added to the inherited environment
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    /// A command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The interactive shell of a `shell` request
    pub fn shell(config: &SessionConfig) -> Self {
        let mut command = Self::new(&config.shell);
        command.args = config.shell_args.clone();
        command
    }

    /// `<exec_shell> -c <command>` for an `exec` request
    pub fn exec(config: &SessionConfig, command: &str) -> Self {
        Self::new(&config.exec_shell).arg("-c").arg(command)
    }

    pub(crate) fn to_pty_command(&self) -> CommandBuilder {
        let mut builder = CommandBuilder::new(&self.program);
        builder.args(&self.args);
        for (key, value) in &self.env {
            builder.env(key, value);
        }
        builder
    }
}

/// A process with piped standard streams
pub struct PipedProcess {
    /// Child process handle
    pub child: Child,
    /// Process standard input
    pub stdin: ChildStdin,
    /// Process standard output
    pub stdout: ChildStdout,
    /// Process standard error
    pub stderr: ChildStderr,
}

/// Start `command` with stdin, stdout and stderr on separate pipes
pub fn spawn_piped(command: &CommandLine) -> Result<PipedProcess, SessionError> {
    let spawn_error = |reason: String| SessionError::Spawn {
        program: command.program.clone(),
        reason,
    };

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .envs(command.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(e.to_string()))?;

    tracing::info!("Spawned {} with PID: {:?}", command.program, child.id());

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| spawn_error("stdin pipe unavailable".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_error("stdout pipe unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| spawn_error("stderr pipe unavailable".to_string()))?;

    Ok(PipedProcess {
        child,
        stdin,
        stdout,
        stderr,
    })
}

/// Run a one-shot command against a channel and return its exit code.
///
/// Inbound channel bytes feed the process's stdin; stdout and stderr are
/// each copied to the channel as they arrive. Returns once the process has
/// exited and both output streams are drained, or once
/// [`OUTPUT_DRAIN_GRACE`] has passed since the exit, whichever comes first:
/// a background child can keep the pipes open long after the command
/// itself is done. Any failure to start or
/// wait on the process yields [`ExitCode::UNKNOWN`].
pub async fn run_command(
    command: &CommandLine,
    inbound: mpsc::UnboundedReceiver<Bytes>,
    sink: Arc<dyn ChannelSink>,
) -> ExitCode {
    let PipedProcess {
        mut child,
        stdin,
        stdout,
        stderr,
    } = match spawn_piped(command) {
        Ok(process) => process,
        Err(e) => {
            tracing::warn!("Could not start command: {}", e);
            return ExitCode::UNKNOWN;
        }
    };

    let stdin_task = tokio::spawn(bridge::pump_from_channel(inbound, stdin));
    let stdout_task = tokio::spawn(bridge::pump_to_channel(stdout, Arc::clone(&sink), "stdout"));
    let stderr_task = tokio::spawn(bridge::pump_to_channel(stderr, Arc::clone(&sink), "stderr"));

    let code = match child.wait().await {
        Ok(status) => {
            tracing::debug!("Command exited with {}", status);
            ExitCode::from_status_code(status.code())
        }
        Err(e) => {
            tracing::warn!("Failed to wait for command: {}", e);
            ExitCode::UNKNOWN
        }
    };

    let deadline = Instant::now() + OUTPUT_DRAIN_GRACE;
    for (label, mut task) in [("stdout", stdout_task), ("stderr", stderr_task)] {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(copied)) => tracing::trace!("{} bridge copied {} bytes", label, copied),
            Ok(Err(e)) => tracing::warn!("Output bridge failed: {}", e),
            Err(_) => {
                tracing::debug!("{} still open after command exit, detaching", label);
                task.abort();
            }
        }
    }
    stdin_task.abort();

    code
}
