//! Transport-facing handle of one session channel
//!
//! The transport delivers requests and data for a channel from its own
//! connection task. [`SessionChannel`] answers each request immediately
//! and queues admitted ones for the channel's [`SessionHandler`] task, so
//! a long-running `exec` never stalls the connection.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use qd_core::config::SessionConfig;
use qd_core::ChannelSink;
use qd_protocol::{ChannelRequest, Reply};

use super::handler::SessionHandler;
use super::teardown::TeardownGuard;

/// Decides the reply for each request of one channel.
///
/// On top of the per-request policy, only the first `exec`/`shell` of a
/// channel is admitted: a session runs exactly one process.
#[derive(Debug, Default)]
pub struct RequestGate {
    process_started: bool,
}

impl RequestGate {
    /// Create a gate for a channel with no process yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply for `request`, recording it if it starts the process
    pub fn admit(&mut self, request: &ChannelRequest) -> Reply {
        let reply = request.reply();
        if request.starts_process() && reply == Reply::Accept {
            if self.process_started {
                return Reply::Reject;
            }
            self.process_started = true;
        }
        reply
    }
}

/// Request and data entry point for one accepted session channel
pub struct SessionChannel {
    /// Reply policy
    gate: RequestGate,
    /// Admitted requests, in arrival order
    requests: mpsc::UnboundedSender<ChannelRequest>,
    /// Inbound bytes; dropped on peer EOF
    inbound: Option<mpsc::UnboundedSender<Bytes>>,
    /// Session teardown guard
    teardown: TeardownGuard,
}

impl SessionChannel {
    /// Start the session task for a newly accepted channel
    pub fn open(sink: Arc<dyn ChannelSink>, config: Arc<SessionConfig>) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let handler = SessionHandler::new(sink, config, inbound_rx);
        let teardown = handler.teardown().clone();
        tokio::spawn(handler.run(request_rx));

        Self {
            gate: RequestGate::new(),
            requests: request_tx,
            inbound: Some(inbound_tx),
            teardown,
        }
    }

    /// Submit a request; returns the reply to send to the peer
    pub fn request(&mut self, request: ChannelRequest) -> Reply {
        let reply = self.gate.admit(&request);
        if reply == Reply::Reject {
            tracing::debug!("Rejecting {} request", request.kind());
            return reply;
        }

        if self.requests.send(request).is_err() {
            tracing::warn!("Session task is gone, dropping request");
        }
        reply
    }

    /// Deliver inbound channel bytes
    pub fn data(&self, data: &[u8]) {
        let Some(inbound) = &self.inbound else {
            tracing::debug!("Dropping {} bytes received after EOF", data.len());
            return;
        };
        if inbound.send(Bytes::copy_from_slice(data)).is_err() {
            tracing::trace!("No process reading channel input, dropped {} bytes", data.len());
        }
    }

    /// The peer will send no more data
    pub fn eof(&mut self) {
        self.inbound = None;
    }

    /// The session's teardown guard
    pub fn teardown(&self) -> &TeardownGuard {
        &self.teardown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_protocol::TerminalSize;

    fn exec(command: &str) -> ChannelRequest {
        ChannelRequest::Exec {
            command: command.to_string(),
        }
    }

    fn shell() -> ChannelRequest {
        ChannelRequest::Shell {
            payload: Bytes::new(),
        }
    }

    #[test]
    fn test_gate_admits_one_process() {
        let mut gate = RequestGate::new();
        assert_eq!(gate.admit(&exec("true")), Reply::Accept);
        assert_eq!(gate.admit(&shell()), Reply::Reject);
        assert_eq!(gate.admit(&exec("true")), Reply::Reject);
    }

    #[test]
    fn test_gate_rejected_shell_does_not_count() {
        let mut gate = RequestGate::new();
        let with_payload = ChannelRequest::Shell {
            payload: Bytes::from_static(b"ls"),
        };
        assert_eq!(gate.admit(&with_payload), Reply::Reject);
        assert_eq!(gate.admit(&shell()), Reply::Accept);
    }

    #[test]
    fn test_gate_terminal_requests_unaffected() {
        let mut gate = RequestGate::new();
        let pty = ChannelRequest::PtyReq {
            term: "xterm".to_string(),
            size: TerminalSize::default(),
        };
        let resize = ChannelRequest::WindowChange {
            size: TerminalSize::new(40, 100),
        };

        assert_eq!(gate.admit(&pty), Reply::Accept);
        assert_eq!(gate.admit(&shell()), Reply::Accept);
        assert_eq!(gate.admit(&resize), Reply::None);
        assert_eq!(gate.admit(&resize), Reply::None);
    }
}
