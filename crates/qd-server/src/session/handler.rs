//! Per-channel session handler
//!
//! Consumes one channel's request stream in arrival order and drives the
//! lifecycle of the channel's single process. The handler keeps running
//! while the bridges of a started shell run beside it, so `window-change`
//! requests keep reaching the terminal for the life of the session.

use std::sync::Arc;

use bytes::Bytes;
use portable_pty::Child;
use tokio::sync::mpsc;

use qd_core::config::SessionConfig;
use qd_core::ChannelSink;
use qd_protocol::{ChannelRequest, TerminalSize};

use super::bridge;
use super::process::{self, CommandLine};
use super::pty::Terminal;
use super::teardown::TeardownGuard;

/// Mutable state of one session channel
pub struct SessionHandler {
    /// Outbound half of the channel
    sink: Arc<dyn ChannelSink>,
    /// Process settings
    config: Arc<SessionConfig>,
    /// Inbound channel bytes, until handed to the process
    inbound: Option<mpsc::UnboundedReceiver<Bytes>>,
    /// Terminal established by `pty-req` or `shell`
    terminal: Option<Terminal>,
    /// Guards the close sequence
    teardown: TeardownGuard,
}

impl SessionHandler {
    /// Create a handler for a freshly accepted channel
    pub fn new(
        sink: Arc<dyn ChannelSink>,
        config: Arc<SessionConfig>,
        inbound: mpsc::UnboundedReceiver<Bytes>,
    ) -> Self {
        Self {
            sink,
            config,
            inbound: Some(inbound),
            terminal: None,
            teardown: TeardownGuard::new(),
        }
    }

    /// The session's teardown guard; triggered once the channel is closing
    pub fn teardown(&self) -> &TeardownGuard {
        &self.teardown
    }

    /// Current dimensions of the session terminal, if one exists
    pub fn terminal_size(&self) -> Option<TerminalSize> {
        let terminal = self.terminal.as_ref()?;
        match terminal.size() {
            Ok(size) => Some(size),
            Err(e) => {
                tracing::warn!("Failed to query pty size: {}", e);
                None
            }
        }
    }

    /// Process requests until the channel's request stream ends
    pub async fn run(mut self, mut requests: mpsc::UnboundedReceiver<ChannelRequest>) {
        while let Some(request) = requests.recv().await {
            self.handle(request).await;
        }
        tracing::debug!("Request stream ended");
    }

    /// Act on one request.
    ///
    /// The reply owed for the request has already been sent by the caller.
    pub async fn handle(&mut self, request: ChannelRequest) {
        tracing::debug!("Handling {} request", request.kind());

        match request {
            ChannelRequest::Exec { command } => self.run_exec(&command).await,

            ChannelRequest::Shell { payload } => {
                if !payload.is_empty() {
                    tracing::debug!("Ignoring shell request with {} byte payload", payload.len());
                    return;
                }
                self.start_shell().await;
            }

            ChannelRequest::PtyReq { term, size } => self.request_pty(term, size).await,

            ChannelRequest::WindowChange { size } => self.apply_resize(size),

            ChannelRequest::Other { kind } => {
                tracing::debug!("Rejected unsupported request: {}", kind);
            }
        }
    }

    /// Run a one-shot command, report its exit status and close the channel.
    /// Blocks request processing until the command has exited.
    async fn run_exec(&mut self, command: &str) {
        let Some(inbound) = self.inbound.take() else {
            tracing::warn!("Ignoring exec: session already ran a process");
            return;
        };

        tracing::info!("Running command: {}", command);
        let command = CommandLine::exec(&self.config, command);
        let code = process::run_command(&command, inbound, Arc::clone(&self.sink)).await;
        tracing::info!("Command exited with code {}", code);

        if !self.teardown.trigger() {
            return;
        }
        let _ = self.sink.eof().await;
        if let Err(e) = self.sink.exit_status(code).await {
            tracing::debug!("Could not send exit status: {}", e);
        }
        let _ = self.sink.close().await;
    }

    /// Start the interactive shell on the session terminal
    async fn start_shell(&mut self) {
        let Some(inbound) = self.inbound.take() else {
            tracing::warn!("Ignoring shell: session already ran a process");
            return;
        };

        if self.terminal.is_none() {
            tracing::info!("Creating pty...");
            match Terminal::open(self.config.default_size, self.config.default_term.clone()) {
                Ok(terminal) => self.terminal = Some(terminal),
                Err(e) => {
                    tracing::error!("Could not start pty ({})", e);
                    self.abort().await;
                    return;
                }
            }
        }

        let Some(terminal) = self.terminal.as_mut() else {
            return;
        };
        let command = CommandLine::shell(&self.config).env("TERM", terminal.term());

        let process = match terminal.spawn(&command) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!("Could not start shell ({})", e);
                self.abort().await;
                return;
            }
        };

        bridge::spawn_terminal_output(process.reader, Arc::clone(&self.sink), self.teardown.clone());
        bridge::spawn_terminal_input(inbound, process.writer, self.teardown.clone());
        tokio::spawn(close_interactive(
            self.teardown.clone(),
            Arc::clone(&self.sink),
            process.child,
        ));
    }

    /// Establish the terminal, or resize it if it already exists
    async fn request_pty(&mut self, term: String, size: TerminalSize) {
        if self.terminal.is_some() {
            self.apply_resize(size);
            return;
        }

        let term = if term.is_empty() {
            self.config.default_term.clone()
        } else {
            term
        };

        match Terminal::open(size, term) {
            Ok(terminal) => self.terminal = Some(terminal),
            Err(e) => {
                tracing::error!("Could not allocate pty ({})", e);
                self.abort().await;
            }
        }
    }

    /// Apply dimensions to the current terminal; no terminal, no effect
    fn apply_resize(&self, size: TerminalSize) {
        match &self.terminal {
            Some(terminal) => {
                if let Err(e) = terminal.resize(size) {
                    tracing::warn!("{}", e);
                }
            }
            None => tracing::debug!("Ignoring resize to {}: no pty allocated", size),
        }
    }

    /// Close the channel after a resource failure, without exit status
    async fn abort(&mut self) {
        if self.teardown.trigger() {
            let _ = self.sink.close().await;
        }
    }
}

/// Close sequence of an interactive session: close the channel, then reap
/// the shell, hanging it up first if it is still running.
async fn close_interactive(
    teardown: TeardownGuard,
    sink: Arc<dyn ChannelSink>,
    mut child: Box<dyn Child + Send + Sync>,
) {
    teardown.triggered().await;

    let _ = sink.close().await;

    let reaped = tokio::task::spawn_blocking(move || {
        if let Ok(None) = child.try_wait() {
            tracing::debug!("Shell still running, hanging up");
            let _ = child.kill();
        }
        child.wait()
    })
    .await;

    match reaped {
        Ok(Ok(status)) => tracing::debug!("Shell exited with code {}", status.exit_code()),
        Ok(Err(e)) => tracing::warn!("Failed to exit shell ({})", e),
        Err(e) => tracing::warn!("Failed to exit shell ({})", e),
    }
    tracing::info!("Session closed");
}
