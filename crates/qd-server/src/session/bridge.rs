//! I/O bridges between a channel and a local process
//!
//! Each bridge copies bytes from one stream to another until either side
//! ends. Pipe bridges are plain async tasks; terminal bridges run their
//! blocking PTY reads and writes on the blocking thread pool, since the
//! portable-pty streams are synchronous.

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use qd_core::ChannelSink;

use super::teardown::TeardownGuard;

/// Read buffer size for all bridges
const BRIDGE_BUFFER_SIZE: usize = 8192;

/// Chunks buffered between the blocking PTY reader and the channel writer
const TERMINAL_OUTPUT_CAPACITY: usize = 64;

/// Copy `reader` to the channel until end-of-stream. Returns bytes copied.
pub async fn pump_to_channel<R>(mut reader: R, sink: Arc<dyn ChannelSink>, label: &'static str) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; BRIDGE_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("{} reached EOF after {} bytes", label, total);
                break;
            }
            Ok(n) => {
                tracing::trace!("Read {} bytes from {}", n, label);
                if let Err(e) = sink.data(&buf[..n]).await {
                    tracing::debug!("Dropping {} output: {}", label, e);
                    break;
                }
                total += n as u64;
            }
            Err(e) => {
                tracing::warn!("Error reading {}: {}", label, e);
                break;
            }
        }
    }

    total
}

/// Copy inbound channel bytes to `writer` until the peer ends its stream,
/// then shut the writer down so the process sees end-of-input.
pub async fn pump_from_channel<W>(mut inbound: mpsc::UnboundedReceiver<Bytes>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(data) = inbound.recv().await {
        tracing::trace!("Writing {} bytes to stdin", data.len());
        if let Err(e) = writer.write_all(&data).await {
            tracing::debug!("Error writing to stdin: {}", e);
            return;
        }
        if let Err(e) = writer.flush().await {
            tracing::debug!("Error flushing stdin: {}", e);
            return;
        }
    }

    tracing::debug!("Channel input ended, closing stdin");
    let _ = writer.shutdown().await;
}

/// Bridge terminal output to the channel; triggers teardown when the
/// terminal reaches end-of-stream or the channel stops accepting data.
pub fn spawn_terminal_output(
    reader: Box<dyn Read + Send>,
    sink: Arc<dyn ChannelSink>,
    guard: TeardownGuard,
) -> JoinHandle<()> {
    let (tx, mut rx) = mpsc::channel::<Bytes>(TERMINAL_OUTPUT_CAPACITY);
    tokio::task::spawn_blocking(move || read_terminal(reader, tx));

    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if let Err(e) = sink.data(&chunk).await {
                tracing::debug!("Dropping terminal output: {}", e);
                break;
            }
        }
        if guard.trigger() {
            tracing::debug!("Terminal output ended first, tearing down");
        }
    })
}

fn read_terminal(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Bytes>) {
    let mut buf = [0u8; BRIDGE_BUFFER_SIZE];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                tracing::debug!("PTY reader EOF");
                break;
            }
            Ok(n) => {
                if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    tracing::debug!("PTY output channel closed");
                    break;
                }
            }
            Err(e) => {
                // Linux reports EIO once the slave side has no more holders
                tracing::debug!("PTY reader closed: {}", e);
                break;
            }
        }
    }
}

/// Bridge inbound channel bytes to the terminal; triggers teardown when
/// the peer ends its stream or the terminal stops accepting input.
pub fn spawn_terminal_input(
    mut inbound: mpsc::UnboundedReceiver<Bytes>,
    mut writer: Box<dyn Write + Send>,
    guard: TeardownGuard,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(data) = inbound.blocking_recv() {
            if let Err(e) = writer.write_all(&data).and_then(|_| writer.flush()) {
                tracing::debug!("Error writing to PTY: {}", e);
                break;
            }
        }
        if guard.trigger() {
            tracing::debug!("Channel input ended first, tearing down");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qd_core::error::SessionError;
    use qd_protocol::ExitCode;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct BufferSink {
        data: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl ChannelSink for BufferSink {
        async fn data(&self, data: &[u8]) -> Result<(), SessionError> {
            self.data.lock().await.extend_from_slice(data);
            Ok(())
        }
        async fn exit_status(&self, _code: ExitCode) -> Result<(), SessionError> {
            Ok(())
        }
        async fn eof(&self) -> Result<(), SessionError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pump_to_channel_copies_everything() {
        let sink = Arc::new(BufferSink::default());
        let input: &[u8] = b"hello over the bridge";

        let copied = pump_to_channel(input, sink.clone(), "test").await;

        assert_eq!(copied, input.len() as u64);
        assert_eq!(sink.data.lock().await.as_slice(), input);
    }

    #[tokio::test]
    async fn test_pump_from_channel_ends_on_sender_drop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (writer, mut reader) = tokio::io::duplex(64);

        tx.send(Bytes::from_static(b"ab")).unwrap();
        tx.send(Bytes::from_static(b"cd")).unwrap();
        drop(tx);

        pump_from_channel(rx, writer).await;

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcd");
    }

    #[tokio::test]
    async fn test_terminal_input_triggers_teardown_on_eof() {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = TeardownGuard::new();

        let handle = spawn_terminal_input(rx, Box::new(std::io::sink()), guard.clone());
        tx.send(Bytes::from_static(b"ls\n")).unwrap();
        drop(tx);

        handle.await.unwrap();
        assert!(guard.is_triggered());
    }

    #[tokio::test]
    async fn test_terminal_output_triggers_teardown_on_eof() {
        let sink = Arc::new(BufferSink::default());
        let guard = TeardownGuard::new();

        let reader: Box<dyn Read + Send> = Box::new(std::io::Cursor::new(b"prompt$ ".to_vec()));
        spawn_terminal_output(reader, sink.clone(), guard.clone())
            .await
            .unwrap();

        assert!(guard.is_triggered());
        assert_eq!(sink.data.lock().await.as_slice(), b"prompt$ ");
    }
}
