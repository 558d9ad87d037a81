//! Session terminal handle
//!
//! Wraps a pseudo-terminal pair from the portable-pty crate. The pair is
//! opened by the first `pty-req` (or by `shell` when no terminal was
//! requested); the shell later runs on its slave side.

use std::io::{Read, Write};

use portable_pty::{native_pty_system, Child, MasterPty, PtySize, SlavePty};

use qd_core::error::SessionError;
use qd_protocol::TerminalSize;

use super::process::CommandLine;

fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// A session's pseudo-terminal
pub struct Terminal {
    /// Master side, kept for resizing
    master: Box<dyn MasterPty + Send>,
    /// Slave side until a process is spawned on it
    slave: Option<Box<dyn SlavePty + Send>>,
    /// Terminal type exported as `TERM`
    term: String,
}

/// A process running on a terminal, with the master-side streams
pub struct InteractiveProcess {
    /// Child process handle
    pub child: Box<dyn Child + Send + Sync>,
    /// Terminal output
    pub reader: Box<dyn Read + Send>,
    /// Terminal input
    pub writer: Box<dyn Write + Send>,
}

impl Terminal {
    /// Open a new PTY pair with the given size
    pub fn open(size: TerminalSize, term: impl Into<String>) -> Result<Self, SessionError> {
        let pair = native_pty_system()
            .openpty(pty_size(size))
            .map_err(|e| SessionError::PtyAllocation(e.to_string()))?;

        let term = term.into();
        tracing::debug!("Opened {} pty ({})", size, term);

        Ok(Self {
            master: pair.master,
            slave: Some(pair.slave),
            term,
        })
    }

    /// Terminal type
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Apply new dimensions to the device
    pub fn resize(&self, size: TerminalSize) -> Result<(), SessionError> {
        tracing::debug!("Resizing pty to {}", size);
        self.master
            .resize(pty_size(size))
            .map_err(|e| SessionError::Resize(e.to_string()))
    }

    /// Current dimensions as reported by the device
    pub fn size(&self) -> Result<TerminalSize, SessionError> {
        let size = self
            .master
            .get_size()
            .map_err(|e| SessionError::Resize(e.to_string()))?;
        Ok(TerminalSize::new(size.rows, size.cols))
    }

    /// Spawn `command` on the slave side.
    ///
    /// The slave handle is released afterwards so that the master reports
    /// end-of-stream once the process and its children have exited.
    pub fn spawn(&mut self, command: &CommandLine) -> Result<InteractiveProcess, SessionError> {
        let slave = self.slave.take().ok_or_else(|| {
            SessionError::PtyAllocation("terminal already has a process attached".to_string())
        })?;

        let child = slave
            .spawn_command(command.to_pty_command())
            .map_err(|e| SessionError::Spawn {
                program: command.program.clone(),
                reason: e.to_string(),
            })?;
        drop(slave);

        tracing::info!(
            "Spawned {} on pty with PID: {:?}",
            command.program,
            child.process_id()
        );

        let reader = self
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::PtyAllocation(format!("Failed to clone PTY reader: {}", e)))?;

        let writer = self
            .master
            .take_writer()
            .map_err(|e| SessionError::PtyAllocation(format!("Failed to take PTY writer: {}", e)))?;

        Ok(InteractiveProcess {
            child,
            reader,
            writer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_reports_requested_size() {
        let terminal = Terminal::open(TerminalSize::new(24, 80), "xterm").unwrap();
        assert_eq!(terminal.size().unwrap(), TerminalSize::new(24, 80));
        assert_eq!(terminal.term(), "xterm");
    }

    #[test]
    fn test_resize_last_write_wins() {
        let terminal = Terminal::open(TerminalSize::new(24, 80), "xterm").unwrap();
        terminal.resize(TerminalSize::new(40, 120)).unwrap();
        terminal.resize(TerminalSize::new(30, 100)).unwrap();
        assert_eq!(terminal.size().unwrap(), TerminalSize::new(30, 100));
    }

    #[test]
    fn test_spawn_twice_fails() {
        let mut terminal = Terminal::open(TerminalSize::default(), "xterm").unwrap();
        let command = CommandLine::new("sh").arg("-c").arg("exit 0");

        let mut process = terminal.spawn(&command).unwrap();
        assert!(matches!(
            terminal.spawn(&command),
            Err(SessionError::PtyAllocation(_))
        ));

        process.child.wait().unwrap();
    }
}
