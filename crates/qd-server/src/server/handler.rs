//! SSH connection handler implementation
//!
//! Implements the russh server handler for one client connection. Every
//! authentication attempt is accepted; `session` channels are handed to
//! the channel dispatcher and every other channel type is refused.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::server::{Auth, Handle, Handler, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, MethodSet, Pty};
use russh_keys::key::{KeyPair, PublicKey};

use qd_core::{ChannelSink, SessionError};
use qd_protocol::{ChannelRequest, ExitCode, Reply, TerminalSize};

use crate::dispatch::ChannelDispatcher;
use crate::session::SessionChannel;

/// Outbound half of a russh channel
pub struct RusshChannel {
    handle: Handle,
    id: ChannelId,
}

impl RusshChannel {
    /// Wrap channel `id` of the connection behind `handle`
    pub fn new(handle: Handle, id: ChannelId) -> Self {
        Self { handle, id }
    }
}

#[async_trait]
impl ChannelSink for RusshChannel {
    async fn data(&self, data: &[u8]) -> Result<(), SessionError> {
        self.handle
            .data(self.id, CryptoVec::from_slice(data))
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    async fn exit_status(&self, code: ExitCode) -> Result<(), SessionError> {
        self.handle
            .exit_status_request(self.id, code.as_u32())
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    async fn eof(&self) -> Result<(), SessionError> {
        self.handle
            .eof(self.id)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.handle
            .close(self.id)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }
}

/// Handler for a single SSH client connection
pub struct ConnectionHandler {
    /// Peer address of the connecting client
    peer_addr: SocketAddr,
    /// Opens session channels
    dispatcher: Arc<ChannelDispatcher>,
    /// Open session channels of this connection
    channels: HashMap<ChannelId, SessionChannel>,
}

impl ConnectionHandler {
    /// Create a handler for a connection from `peer_addr`
    pub fn new(dispatcher: Arc<ChannelDispatcher>, peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            dispatcher,
            channels: HashMap::new(),
        }
    }

    /// Hand a request to its channel and send the reply it is owed
    fn route(&mut self, channel: ChannelId, request: ChannelRequest, session: &mut Session) {
        let reply = match self.channels.get_mut(&channel) {
            Some(session_channel) => session_channel.request(request),
            None => {
                tracing::debug!("{} request for unknown channel {:?}", request.kind(), channel);
                Reply::Reject
            }
        };

        match reply {
            Reply::Accept => {
                let _ = session.channel_success(channel);
            }
            Reply::Reject => {
                let _ = session.channel_failure(channel);
            }
            Reply::None => {}
        }
    }

    /// Reject a non-session channel open
    fn refuse(&self, channel_type: &str) -> bool {
        if let Err(rejection) = ChannelDispatcher::check(channel_type) {
            tracing::warn!("Refusing channel from {}: {}", self.peer_addr, rejection);
        }
        false
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        // Connection is gone; close down whatever is still running
        for (_, channel) in self.channels.drain() {
            channel.teardown().trigger();
        }
    }
}

#[async_trait]
impl Handler for ConnectionHandler {
    type Error = anyhow::Error;

    /// Accept any password, logging the credential
    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        tracing::info!("Authorized with password: {}/{}", user, password);
        Ok(Auth::Accept)
    }

    /// Accept any public key, logging its fingerprint
    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        tracing::info!(
            "Authorized with public key: {} ({}), fingerprint: {}",
            user,
            self.peer_addr.ip(),
            public_key.fingerprint()
        );
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let channel_id = channel.id();
        let sink = Arc::new(RusshChannel::new(session.handle(), channel_id));

        match self.dispatcher.open("session", sink) {
            Ok(session_channel) => {
                tracing::debug!("Channel opened: {:?}", channel_id);
                self.channels.insert(channel_id, session_channel);
                Ok(true)
            }
            Err(rejection) => {
                tracing::warn!("{}", rejection);
                Ok(false)
            }
        }
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        _channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("direct-tcpip to {}:{}", host_to_connect, port_to_connect);
        Ok(self.refuse("direct-tcpip"))
    }

    async fn channel_open_x11(
        &mut self,
        _channel: Channel<Msg>,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(self.refuse("x11"))
    }

    /// Global requests are discarded
    async fn tcpip_forward(
        &mut self,
        address: &str,
        port: &mut u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Discarding tcpip-forward request for {}:{}", address, port);
        Ok(false)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let request = ChannelRequest::PtyReq {
            term: term.to_string(),
            size: TerminalSize::from_dimensions(col_width, row_height),
        };
        self.route(channel, request, session);
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let request = ChannelRequest::WindowChange {
            size: TerminalSize::from_dimensions(col_width, row_height),
        };
        self.route(channel, request, session);
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let request = ChannelRequest::Shell {
            payload: bytes::Bytes::new(),
        };
        self.route(channel, request, session);
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        match ChannelRequest::exec(data) {
            Ok(request) => self.route(channel, request, session),
            Err(e) => {
                tracing::warn!("Rejecting exec request: {}", e);
                let _ = session.channel_failure(channel);
            }
        }
        Ok(())
    }

    async fn env_request(
        &mut self,
        channel: ChannelId,
        variable_name: &str,
        _variable_value: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::trace!("env request for {}", variable_name);
        let request = ChannelRequest::Other {
            kind: "env".to_string(),
        };
        self.route(channel, request, session);
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!("subsystem request for {}", name);
        let request = ChannelRequest::Other {
            kind: "subsystem".to_string(),
        };
        self.route(channel, request, session);
        Ok(())
    }

    /// Handle incoming data on a channel
    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::trace!("Received {} bytes on channel {:?}", data.len(), channel);
        if let Some(session_channel) = self.channels.get(&channel) {
            session_channel.data(data);
        }
        Ok(())
    }

    /// Handle channel EOF
    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!("Channel EOF: {:?}", channel);
        if let Some(session_channel) = self.channels.get_mut(&channel) {
            session_channel.eof();
        }
        Ok(())
    }

    /// Handle channel close
    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!("Channel closed: {:?}", channel);
        if let Some(session_channel) = self.channels.remove(&channel) {
            session_channel.teardown().trigger();
        }
        Ok(())
    }
}

/// russh server configuration for the given host key
pub fn russh_config(host_key: KeyPair) -> russh::server::Config {
    let mut config = russh::server::Config::default();
    config.keys.push(host_key);
    config.methods = MethodSet::PASSWORD | MethodSet::PUBLICKEY;
    config.auth_rejection_time = Duration::from_secs(1);
    config.auth_rejection_time_initial = Some(Duration::from_secs(0));
    config
}
