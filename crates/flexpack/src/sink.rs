//! The sink abstraction the `Writer` appends to. Deliberately out of scope
//! as a subsystem (`spec.md` §1, §6). This module only states the contract
//! and, for convenience, implements it for `Vec<u8>` so a caller without
//! their own byte sink can still use `Writer` directly.

use crate::error::SinkError;

/// A byte sink the `Writer` and `apply_updates` append to. The core never
/// owns byte storage; every write call is borrowed for its own duration.
pub trait Sink {
    fn write_byte(&mut self, byte: u8) -> Result<(), SinkError>;
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Writes a little-endian integer payload of `N` bytes. The default
    /// implementation forwards to `write_all`; a sink backed by something
    /// other than a flat buffer (e.g. a checksumming wrapper) can override
    /// this to avoid an intermediate copy.
    #[inline]
    fn write_int_le<const N: usize>(&mut self, bytes: [u8; N]) -> Result<(), SinkError> {
        self.write_all(&bytes)
    }
}

impl Sink for Vec<u8> {
    #[inline]
    fn write_byte(&mut self, byte: u8) -> Result<(), SinkError> {
        self.push(byte);
        Ok(())
    }

    #[inline]
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_appends() {
        let mut buf = Vec::new();
        buf.write_byte(1).unwrap();
        buf.write_all(&[2, 3, 4]).unwrap();
        buf.write_int_le(5u32.to_le_bytes()).unwrap();
        assert_eq!(buf, vec![1, 2, 3, 4, 5, 0, 0, 0]);
    }
}
