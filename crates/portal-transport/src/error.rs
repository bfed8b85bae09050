/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer closed the stream in the middle of a frame.
    #[error("truncated frame: expected {expected} payload bytes")]
    TruncatedFrame {
        /// The payload length announced by the frame header.
        expected: u32,
    },

    /// A frame announced a payload larger than the configured maximum.
    #[error("frame payload size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// The announced (or attempted) payload size.
        size: usize,
        /// The configured maximum.
        max: u32,
    },
}
