//! WebSocket frame parsing and serialization (RFC 6455).
//!
//! Frames can be decoded from an in-memory buffer ([`Frame::parse`]) or pulled
//! straight off a blocking stream ([`Frame::read_from`]); both paths share the
//! same header decoder. Serialization writes into a buffer or onto a stream.

use std::io::{Read, Write};

use bytes::BufMut;

use crate::error::{Error, FrameError, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::validation::check_frame_rules;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest possible header: 2 fixed bytes, 8 extended length bytes, 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// Knobs for the frame decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Largest payload the decoder will accept, checked before allocating.
    pub max_payload: usize,
    /// Decode undefined opcodes as [`OpCode::Reserved`] instead of failing.
    pub allow_reserved_opcodes: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_payload: usize::MAX,
            allow_reserved_opcodes: false,
        }
    }
}

impl DecodeOptions {
    /// Options with the given payload limit.
    #[must_use]
    pub const fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Tolerate reserved opcodes.
    #[must_use]
    pub const fn with_reserved_opcodes(mut self, allow: bool) -> Self {
        self.allow_reserved_opcodes = allow;
        self
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// RSV1-RSV3 as a 3-bit value (RSV1 is the high bit).
    pub rsv: u8,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, if the MASK bit was set.
    pub mask: Option<[u8; 4]>,
    /// Payload length in bytes.
    pub payload_len: usize,
    /// Total header length, including extended length and mask key.
    pub header_len: usize,
}

impl FrameHeader {
    /// Header length implied by the first two bytes of a frame.
    #[inline]
    #[must_use]
    pub const fn encoded_len(byte1: u8) -> usize {
        let extended = match byte1 & 0x7F {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        let mask = if byte1 & 0x80 != 0 { 4 } else { 0 };
        2 + extended + mask
    }

    /// Parse a frame header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `FrameError::InvalidOpcode` for reserved opcodes (unless allowed)
    /// - `FrameError::InvalidLength` if the 64-bit length has its MSB set
    /// - `FrameError::TooLarge` if the length exceeds `opts.max_payload`
    pub fn parse(buf: &[u8], opts: &DecodeOptions) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let byte0 = buf[0];
        let byte1 = buf[1];

        let header_len = Self::encoded_len(byte1);
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let fin = byte0 & 0x80 != 0;
        let rsv = (byte0 >> 4) & 0x07;
        let opcode = if opts.allow_reserved_opcodes {
            OpCode::from_u8_lenient(byte0)
        } else {
            OpCode::from_u8(byte0 & 0x0F)?
        };

        let masked = byte1 & 0x80 != 0;
        let (declared, mask_offset) = match byte1 & 0x7F {
            126 => (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4),
            127 => {
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                let len = u64::from_be_bytes(len);
                if len & (1 << 63) != 0 {
                    return Err(FrameError::InvalidLength(len).into());
                }
                (len, 10)
            }
            short => (u64::from(short), 2),
        };

        let payload_len = usize::try_from(declared)
            .ok()
            .filter(|len| *len <= opts.max_payload)
            .ok_or(FrameError::TooLarge {
                size: declared,
                max: opts.max_payload,
            })?;

        let mask = masked.then(|| {
            [
                buf[mask_offset],
                buf[mask_offset + 1],
                buf[mask_offset + 2],
                buf[mask_offset + 3],
            ]
        });

        Ok(Self {
            fin,
            rsv,
            opcode,
            mask,
            payload_len,
            header_len,
        })
    }
}

/// A WebSocket frame as defined in RFC 6455.
///
/// ## Frame Structure
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Reserved bits as a 3-bit value. Must be 0 unless an extension is negotiated.
    pub rsv: u8,
    /// Frame opcode defining the interpretation of payload data.
    pub opcode: OpCode,
    /// Masking key the frame carried on the wire, if any.
    pub mask: Option<[u8; 4]>,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new unmasked frame with the given parameters.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            rsv: 0,
            opcode,
            mask: None,
            payload,
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a close frame with optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = if let Some(code) = code {
            let mut data = code.to_be_bytes().to_vec();
            data.extend_from_slice(reason.as_bytes());
            data
        } else {
            Vec::new()
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Whether the frame carried a mask on the wire.
    #[inline]
    #[must_use]
    pub const fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Get the (unmasked) payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse a frame from a buffer with default [`DecodeOptions`].
    ///
    /// Returns the parsed frame and the number of bytes consumed.
    ///
    /// ## Errors
    ///
    /// - `Error::IncompleteFrame` if not enough data is available
    /// - `Error::Frame` for structurally invalid frames
    #[inline]
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        Self::parse_with(buf, &DecodeOptions::default())
    }

    /// Parse a frame from a buffer.
    ///
    /// ## Errors
    ///
    /// See [`Frame::parse`].
    pub fn parse_with(buf: &[u8], opts: &DecodeOptions) -> Result<(Self, usize)> {
        let header = FrameHeader::parse(buf, opts)?;

        let total_size = header.header_len + header.payload_len;
        if buf.len() < total_size {
            return Err(Error::IncompleteFrame {
                needed: total_size - buf.len(),
            });
        }

        let payload = buf[header.header_len..total_size].to_vec();
        Ok((Self::from_parts(header, payload), total_size))
    }

    /// Read exactly one frame from a blocking stream.
    ///
    /// Reads the fixed header, the extended length and mask key if present,
    /// then exactly `payload_len` bytes, unmasking them in place.
    ///
    /// ## Errors
    ///
    /// - `FrameError::Truncated` if the stream ends mid-frame
    /// - `Error::Frame` for structurally invalid frames
    /// - transport errors from the stream
    pub fn read_from<R: Read + ?Sized>(reader: &mut R, opts: &DecodeOptions) -> Result<Self> {
        let mut head = [0u8; MAX_HEADER_LEN];
        read_exact(reader, &mut head[..2])?;

        let header_len = FrameHeader::encoded_len(head[1]);
        read_exact(reader, &mut head[2..header_len])?;

        let header = FrameHeader::parse(&head[..header_len], opts)?;
        let mut payload = vec![0u8; header.payload_len];
        read_exact(reader, &mut payload)?;

        Ok(Self::from_parts(header, payload))
    }

    fn from_parts(header: FrameHeader, mut payload: Vec<u8>) -> Self {
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }
        Self {
            fin: header.fin,
            rsv: header.rsv,
            opcode: header.opcode,
            mask: header.mask,
            payload,
        }
    }

    /// Validate the frame according to RFC 6455.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV bits are set without extension
    /// - `Error::ProtocolViolation` for reserved opcodes
    /// - `Error::FragmentedControlFrame` if control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if control frame payload > 125 bytes
    pub fn validate(&self) -> Result<()> {
        check_frame_rules(self.fin, self.rsv, self.opcode, self.payload.len())?;

        if let OpCode::Reserved(value) = self.opcode {
            return Err(Error::ProtocolViolation(format!(
                "Reserved opcode {value:#x}"
            )));
        }
        Ok(())
    }

    /// Write the frame to a buffer.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    pub fn write(&self, buf: &mut [u8], mask: Option<[u8; 4]>) -> Result<usize> {
        let total_size = self.wire_size(mask.is_some());
        if buf.len() < total_size {
            return Err(Error::InvalidFrame(format!(
                "Buffer too small: need {} bytes, have {}",
                total_size,
                buf.len()
            )));
        }

        let mut cursor = &mut buf[..total_size];
        self.encode(&mut cursor, mask);
        Ok(total_size)
    }

    /// Append the wire encoding of the frame to `out`.
    ///
    /// With a mask, the MASK bit is set, the key follows the length and the
    /// payload is XOR-ed with `mask[i % 4]`.
    pub fn encode<B: BufMut>(&self, out: &mut B, mask: Option<[u8; 4]>) {
        let payload_len = self.payload.len();

        let mut byte0 = self.opcode.as_u8() | ((self.rsv & 0x07) << 4);
        if self.fin {
            byte0 |= 0x80;
        }
        out.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= 125 {
            out.put_u8(mask_bit | payload_len as u8);
        } else if let Ok(len) = u16::try_from(payload_len) {
            out.put_u8(mask_bit | 126);
            out.put_u16(len);
        } else {
            out.put_u8(mask_bit | 127);
            out.put_u64(payload_len as u64);
        }

        match mask {
            Some(key) => {
                out.put_slice(&key);
                let mut masked = self.payload.clone();
                apply_mask_fast(&mut masked, key);
                out.put_slice(&masked);
            }
            None => out.put_slice(&self.payload),
        }
    }

    /// Serialize the frame directly onto a stream.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the stream.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W, mask: Option<[u8; 4]>) -> Result<()> {
        let mut buf = Vec::with_capacity(self.wire_size(mask.is_some()));
        self.encode(&mut buf, mask);
        writer.write_all(&buf)?;
        Ok(())
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}

fn read_exact<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::Frame(FrameError::Truncated),
        _ => Error::from(err),
    })
}
