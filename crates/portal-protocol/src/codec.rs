//! Binary field codec shared by every packet.
//!
//! There is no self-describing schema on the wire: each packet writes its
//! fields in a fixed order with fixed widths, and the reader consumes them
//! in the same order.
//!
//! | Field type | Encoding |
//! |---|---|
//! | `u8` | 1 byte |
//! | `bool` | 1 byte, `0` or `1` (anything else is an error) |
//! | `u32`, `u64` | little-endian |
//! | string | `u32` byte length, then UTF-8 bytes |
//! | sequence | `u32` item count, then each item |

use crate::{DecodeError, PacketId};

/// A packet body: the fields of one packet kind, without the frame header.
///
/// Every packet struct implements this. `write` followed by `read` must
/// give back an equal value.
pub trait PacketBody: Sized {
    /// The id this packet kind travels under.
    const ID: PacketId;

    /// Appends the packet's fields to the writer.
    fn write(&self, w: &mut PacketWriter);

    /// Reads the packet's fields from the reader.
    ///
    /// Does not check for trailing bytes; [`decode_body`] does that.
    fn read(r: &mut PacketReader<'_>) -> Result<Self, DecodeError>;
}

/// Decodes a complete payload into `P`, rejecting trailing bytes.
pub fn decode_body<P: PacketBody>(payload: &[u8]) -> Result<P, DecodeError> {
    let mut reader = PacketReader::new(payload);
    let body = P::read(&mut reader)?;
    reader.finish()?;
    Ok(body)
}

/// Encodes `P` into a fresh payload buffer.
pub fn encode_body<P: PacketBody>(body: &P) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    body.write(&mut writer);
    writer.into_bytes()
}

// ---------------------------------------------------------------------------
// PacketWriter
// ---------------------------------------------------------------------------

/// Appends fixed-width fields to a byte buffer.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Writes one byte.
    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Writes a bool as a single `0` or `1` byte.
    pub fn bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Writes a little-endian `u32`.
    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian `u64`.
    pub fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn string(&mut self, value: &str) {
        self.u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Writes a sequence count. The caller writes the items after it.
    pub fn count(&mut self, len: usize) {
        self.u32(len as u32);
    }

    /// Consumes the writer and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// PacketReader
// ---------------------------------------------------------------------------

/// Reads fixed-width fields from a borrowed payload.
#[derive(Debug)]
pub struct PacketReader<'a> {
    data: &'a [u8],
}

impl<'a> PacketReader<'a> {
    /// Creates a reader over the whole payload.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.data.len() < n {
            return Err(DecodeError::Truncated {
                needed: n,
                remaining: self.data.len(),
            });
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads one byte.
    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a bool; any byte other than `0` or `1` is rejected for `field`.
    pub fn bool(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidValue {
                field,
                value: other as u32,
            }),
        }
    }

    /// Reads a little-endian `u32`.
    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_le_bytes)
    }

    /// Reads a little-endian `u64`.
    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        self.array().map(u64::from_le_bytes)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Reads a sequence count.
    ///
    /// The count is only a claim; items are still read one by one and fail
    /// with `Truncated` if the payload runs out.
    pub fn count(&mut self) -> Result<usize, DecodeError> {
        self.u32().map(|n| n as usize)
    }

    /// Asserts that the whole payload was consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes(self.data.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_layout_is_little_endian() {
        let mut w = PacketWriter::new();
        w.u8(9);
        w.u32(1);
        w.string("ab");
        assert_eq!(w.into_bytes(), vec![9, 1, 0, 0, 0, 2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn test_reader_reads_fields_in_order() {
        let mut w = PacketWriter::new();
        w.u64(u64::MAX - 1);
        w.bool(true);
        w.string("lobby");
        let bytes = w.into_bytes();

        let mut r = PacketReader::new(&bytes);
        assert_eq!(r.u64().unwrap(), u64::MAX - 1);
        assert!(r.bool("flag").unwrap());
        assert_eq!(r.string().unwrap(), "lobby");
        r.finish().expect("nothing should be left");
    }

    #[test]
    fn test_reader_u32_on_short_input_is_truncated() {
        let mut r = PacketReader::new(&[1, 2]);
        assert_eq!(
            r.u32(),
            Err(DecodeError::Truncated {
                needed: 4,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_reader_string_longer_than_payload_is_truncated() {
        // Claims 100 bytes of string, provides 3.
        let mut bytes = 100u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"abc");

        let mut r = PacketReader::new(&bytes);
        assert!(matches!(r.string(), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_reader_string_invalid_utf8_rejected() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xC3, 0x28]);

        let mut r = PacketReader::new(&bytes);
        assert_eq!(r.string(), Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_reader_bool_out_of_range_rejected() {
        let mut r = PacketReader::new(&[2]);
        assert_eq!(
            r.bool("online"),
            Err(DecodeError::InvalidValue {
                field: "online",
                value: 2
            })
        );
    }

    #[test]
    fn test_finish_with_leftover_bytes_reports_count() {
        let mut r = PacketReader::new(&[1, 2, 3]);
        r.u8().unwrap();
        assert_eq!(r.finish(), Err(DecodeError::TrailingBytes(2)));
    }
}
