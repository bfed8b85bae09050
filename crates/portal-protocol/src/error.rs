//! Error types for the protocol layer.
//!
//! Encoding is infallible: every packet value has exactly one byte
//! representation. Decoding can fail, and every failure is terminal for
//! the connection that produced the bytes. The codec never tries to
//! recover a partially decoded packet.

/// Errors that can occur while decoding a packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload ended before a field could be read.
    #[error("truncated payload: needed {needed} more bytes, {remaining} left")]
    Truncated {
        /// Bytes the field required.
        needed: usize,
        /// Bytes that were actually left.
        remaining: usize,
    },

    /// The packet decoded successfully but bytes were left over.
    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),

    /// The frame carried a packet id this protocol does not define.
    #[error("unknown packet id {0}")]
    UnknownPacket(u32),

    /// An enumerated field held a value outside its defined range.
    #[error("invalid value {value} for {field}")]
    InvalidValue {
        /// Name of the field being decoded.
        field: &'static str,
        /// The raw value found on the wire.
        value: u32,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}
