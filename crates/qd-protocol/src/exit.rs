//! Exit status reporting

use std::fmt;

/// Exit code reported to the peer in an `exit-status` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(pub u32);

impl ExitCode {
    /// Process exited cleanly
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Reported when the real code cannot be determined: the process could
    /// not be started, was killed by a signal, or could not be waited on
    pub const UNKNOWN: ExitCode = ExitCode(1);

    /// Map a process status code (`None` when signal-terminated)
    pub fn from_status_code(code: Option<i32>) -> Self {
        match code {
            Some(code) => ExitCode(code as u32),
            None => Self::UNKNOWN,
        }
    }

    /// Get the raw code
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Encode the `exit-status` request payload
    pub fn to_payload(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_payload() {
        assert_eq!(ExitCode::SUCCESS.to_payload(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_payload_is_big_endian() {
        assert_eq!(ExitCode(258).to_payload(), [0, 0, 1, 2]);
    }

    #[test]
    fn test_signal_termination_reports_one() {
        assert_eq!(ExitCode::from_status_code(None), ExitCode(1));
        assert_eq!(ExitCode::from_status_code(Some(42)), ExitCode(42));
    }
}
