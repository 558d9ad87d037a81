//! SSH server listener
//!
//! Accepts incoming connections and spawns a handler for each client.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use russh_keys::key::KeyPair;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::dispatch::ChannelDispatcher;

use super::handler::{russh_config, ConnectionHandler};

/// SSH server that listens for incoming connections
pub struct SshServer {
    /// russh server configuration
    ssh_config: Arc<russh::server::Config>,
    /// Opens session channels for every connection
    dispatcher: Arc<ChannelDispatcher>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl SshServer {
    /// Create a new SSH server
    pub fn new(host_key: KeyPair, dispatcher: ChannelDispatcher, cancel: CancellationToken) -> Self {
        Self {
            ssh_config: Arc::new(russh_config(host_key)),
            dispatcher: Arc::new(dispatcher),
            cancel,
        }
    }

    /// Bind `bind_addr` and serve until cancelled.
    ///
    /// Failing to bind is the only error; per-connection failures are
    /// logged and the loop keeps accepting.
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Listening on {}", local_addr);

        loop {
            tokio::select! {
                // Check for shutdown
                _ = self.cancel.cancelled() => {
                    tracing::info!("SSH server shutting down");
                    break;
                }

                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => tracing::error!("Failed to accept connection: {}", e),
                    }
                }
            }
        }

        Ok(())
    }

    /// Run the SSH protocol for one accepted connection on its own task
    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::info!("New connection from {}", peer_addr);

        let config = Arc::clone(&self.ssh_config);
        let handler = ConnectionHandler::new(Arc::clone(&self.dispatcher), peer_addr);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let running = match russh::server::run_stream(config, socket, handler).await {
                Ok(running) => running,
                Err(e) => {
                    tracing::warn!("Failed to handshake with {}: {}", peer_addr, e);
                    return;
                }
            };

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Connection handler cancelled for {}", peer_addr);
                    return;
                }
                result = running => result,
            };

            match result {
                Ok(()) => tracing::info!("Connection from {} closed normally", peer_addr),
                Err(e) => tracing::warn!("Connection from {} closed with error: {}", peer_addr, e),
            }
        });
    }
}
