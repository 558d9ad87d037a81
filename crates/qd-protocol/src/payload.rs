//! Big-endian payload field reading
//!
//! Request payloads are sequences of SSH wire fields:
//! - uint32: 4 bytes, big-endian
//! - string: uint32 length followed by that many bytes
//!
//! Every read checks the remaining length first, so a short payload
//! surfaces as [`ProtocolError::Truncated`] rather than a panic.

use bytes::Buf;

use crate::error::ProtocolError;

/// Size of a uint32 field in bytes
pub const U32_SIZE: usize = 4;

/// Cursor over a request payload
#[derive(Debug)]
pub struct PayloadReader<'a> {
    /// Request type, for error reporting
    request: &'static str,
    /// Unread part of the payload
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    /// Create a reader over `payload` belonging to the named request
    pub fn new(request: &'static str, payload: &'a [u8]) -> Self {
        Self {
            request,
            buf: payload,
        }
    }

    fn need(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.len() < needed {
            return Err(ProtocolError::Truncated {
                request: self.request,
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Read a big-endian uint32
    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.need(U32_SIZE)?;
        Ok(self.buf.get_u32())
    }

    /// Read a length-prefixed byte string
    pub fn read_string(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.read_u32()? as usize;
        self.need(len)?;
        let (value, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(value)
    }

    /// Read a length-prefixed string that must be UTF-8
    pub fn read_utf8(&mut self) -> Result<&'a str, ProtocolError> {
        let request = self.request;
        let raw = self.read_string()?;
        std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8 { request })
    }
}

/// Encode a big-endian uint32 field
pub fn put_u32(dst: &mut Vec<u8>, value: u32) {
    dst.extend_from_slice(&value.to_be_bytes());
}

/// Encode a length-prefixed string field
pub fn put_string(dst: &mut Vec<u8>, value: &[u8]) {
    put_u32(dst, value.len() as u32);
    dst.extend_from_slice(value);
}
