//! Length-prefixed framing for control-plane TCP streams.
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! +-------------------+-------------------+----------------------+
//! | length (4 bytes)  | packet id (4 b.)  |   payload            |
//! | u32 little-endian | u32 little-endian |   (length bytes)     |
//! +-------------------+-------------------+----------------------+
//! ```
//!
//! `length` counts the payload only: neither the length prefix nor the
//! packet id are included. A zero-length payload is valid (several
//! request packets carry no fields).

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::TransportError;

/// Size of the fixed frame header (length + packet id).
pub const HEADER_LEN: usize = 8;

/// Configuration for the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 1 MiB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1_048_576,
        }
    }
}

/// One undecoded frame: the packet id and its raw payload bytes.
///
/// The transport never looks inside the payload. Turning it into a typed
/// packet is the protocol layer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Numeric packet id from the frame header.
    pub packet_id: u32,
    /// Payload bytes, exactly as many as the header announced.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame from a packet id and payload.
    pub fn new(packet_id: u32, payload: Vec<u8>) -> Self {
        Self { packet_id, payload }
    }

    /// Serializes the frame (header followed by payload) into one buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.packet_id.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Reads a single frame from the stream.
///
/// Blocks until the full frame is available. Returns `Ok(None)` when the
/// peer closes the stream cleanly on a frame boundary. A stream that ends
/// anywhere inside a frame is an error; a partial frame is never returned.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Option<Frame>, TransportError> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader
            .read(&mut header[filled..])
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::ConnectionClosed(
                "stream ended inside a frame header".into(),
            ));
        }
        filled += n;
    }

    let payload_len =
        u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let packet_id =
        u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    if payload_len > config.max_payload_size {
        return Err(TransportError::FrameTooLarge {
            size: payload_len as usize,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::TruncatedFrame {
                    expected: payload_len,
                }
            } else {
                TransportError::ReceiveFailed(e)
            }
        })?;
    }

    Ok(Some(Frame { packet_id, payload }))
}

/// Writes a single frame to the stream and flushes it.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    frame: &Frame,
    config: &FrameConfig,
) -> Result<(), TransportError> {
    if frame.payload.len() > config.max_payload_size as usize {
        return Err(TransportError::FrameTooLarge {
            size: frame.payload.len(),
            max: config.max_payload_size,
        });
    }

    writer
        .write_all(&frame.to_bytes())
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn default_config() -> FrameConfig {
        FrameConfig::default()
    }

    #[tokio::test]
    async fn test_read_frame_after_write_returns_same_frame() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();
        let frame = Frame::new(2, b"127.0.0.1:19132".to_vec());

        write_frame(&mut client, &frame, &config).await.unwrap();
        let received = read_frame(&mut server, &config).await.unwrap();
        assert_eq!(received, Some(frame));
    }

    #[tokio::test]
    async fn test_read_frame_partial_writes_resume_correctly() {
        // A tiny duplex buffer forces the reader to see the frame in pieces.
        let (mut client, mut server) = duplex(3);
        let config = default_config();
        let frame = Frame::new(7, b"this payload is larger than the pipe".to_vec());

        let expected = frame.clone();
        let write_config = config.clone();
        let writer = tokio::spawn(async move {
            write_frame(&mut client, &frame, &write_config).await.unwrap();
        });

        let received = read_frame(&mut server, &config).await.unwrap();
        writer.await.unwrap();
        assert_eq!(received, Some(expected));
    }

    #[tokio::test]
    async fn test_read_frame_back_to_back_frames_stay_separate() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();

        write_frame(&mut client, &Frame::new(1, b"aaa".to_vec()), &config)
            .await
            .unwrap();
        write_frame(&mut client, &Frame::new(1, b"bbb".to_vec()), &config)
            .await
            .unwrap();

        let first = read_frame(&mut server, &config).await.unwrap().unwrap();
        let second = read_frame(&mut server, &config).await.unwrap().unwrap();
        assert_eq!(first.payload, b"aaa");
        assert_eq!(second.payload, b"bbb");
    }

    #[tokio::test]
    async fn test_read_frame_zero_length_payload_is_valid() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();

        write_frame(&mut client, &Frame::new(6, Vec::new()), &config)
            .await
            .unwrap();
        let received = read_frame(&mut server, &config).await.unwrap().unwrap();
        assert_eq!(received.packet_id, 6);
        assert!(received.payload.is_empty());
    }

    #[tokio::test]
    async fn test_read_frame_clean_close_returns_none() {
        let (client, mut server) = duplex(8192);
        drop(client);

        let result = read_frame(&mut server, &default_config()).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_read_frame_close_inside_header_is_error() {
        let (mut client, mut server) = duplex(8192);
        client.write_all(&[5, 0, 0]).await.unwrap();
        drop(client);

        let result = read_frame(&mut server, &default_config()).await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_read_frame_close_inside_payload_is_truncated() {
        let (mut client, mut server) = duplex(8192);
        // Header announces 10 payload bytes, only 4 follow.
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(&2u32.to_le_bytes()).await.unwrap();
        client.write_all(b"1234").await.unwrap();
        drop(client);

        let result = read_frame(&mut server, &default_config()).await;
        assert!(matches!(
            result,
            Err(TransportError::TruncatedFrame { expected: 10 })
        ));
    }

    #[tokio::test]
    async fn test_read_frame_oversized_header_rejected() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };
        client.write_all(&1024u32.to_le_bytes()).await.unwrap();
        client.write_all(&0u32.to_le_bytes()).await.unwrap();

        let result = read_frame(&mut server, &config).await;
        assert!(matches!(result, Err(TransportError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_write_frame_oversized_payload_rejected() {
        let (mut client, _server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };

        let result =
            write_frame(&mut client, &Frame::new(0, vec![0u8; 1024]), &config)
                .await;
        assert!(matches!(result, Err(TransportError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_to_bytes_layout_is_length_then_id_little_endian() {
        let bytes = Frame::new(0x0102_0304, vec![0xAA, 0xBB]).to_bytes();
        assert_eq!(bytes, vec![2, 0, 0, 0, 4, 3, 2, 1, 0xAA, 0xBB]);
    }
}
