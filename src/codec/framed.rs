use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::config::Config;
use crate::connection::Role;
use crate::error::{Error, FrameError, Result};
use crate::protocol::frame::{DecodeOptions, FrameHeader};
use crate::protocol::handshake::find_head_end;
use crate::protocol::validation::FrameValidator;
use crate::protocol::Frame;
use crate::rng::{self, Entropy};

/// Buffered frame I/O over a blocking byte stream.
///
/// Bytes read past the end of the handshake head or of a frame stay in the
/// read buffer for the next call. A read that times out keeps whatever was
/// already buffered, so retrying resumes mid-frame.
pub struct FramedStream<S> {
    io: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    read_chunk: usize,
    role: Role,
    validator: FrameValidator,
    entropy: Box<dyn Entropy>,
}

impl<S> FramedStream<S> {
    #[must_use]
    pub fn new(io: S, role: Role, config: &Config) -> Self {
        Self::with_entropy(io, role, config, rng::from_config(config))
    }

    #[must_use]
    pub fn with_entropy(io: S, role: Role, config: &Config, entropy: Box<dyn Entropy>) -> Self {
        let validator = FrameValidator::new(role, config.limits)
            .with_accept_unmasked(config.accept_unmasked_frames);
        Self {
            io,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            read_chunk: config.read_buffer_size.max(1),
            role,
            validator,
            entropy,
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Randomness shared by masking and the handshake key.
    pub fn entropy(&mut self) -> &mut dyn Entropy {
        self.entropy.as_mut()
    }

    /// Bytes received but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.read_buf
    }

    pub fn get_ref(&self) -> &S {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.io
    }

    #[must_use]
    pub fn into_inner(self) -> S {
        self.io
    }
}

impl<S: Read + Write> FramedStream<S> {
    /// Read one chunk from the stream into the read buffer.
    ///
    /// Returns the number of bytes read; 0 means end of stream.
    fn fill_buf(&mut self) -> Result<usize> {
        let start = self.read_buf.len();
        self.read_buf.resize(start + self.read_chunk, 0);

        loop {
            match self.io.read(&mut self.read_buf[start..]) {
                Ok(n) => {
                    self.read_buf.truncate(start + n);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.read_buf.truncate(start);
                    return Err(e.into());
                }
            }
        }
    }

    /// Read an HTTP head terminated by an empty line.
    ///
    /// Returns the head including the terminating `\r\n\r\n`; anything after
    /// it stays buffered.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` if no complete head fits in `max_size`
    /// - `Error::ConnectionClosed` if the stream ends first
    /// - transport errors, including `Error::Timeout`
    pub fn read_handshake(&mut self, max_size: usize) -> Result<Vec<u8>> {
        loop {
            if let Some(end) = find_head_end(&self.read_buf) {
                if end > max_size {
                    return Err(Error::HandshakeTooLarge {
                        size: end,
                        max: max_size,
                    });
                }
                let head = self.read_buf.split_to(end);
                trace!(len = head.len(), "read handshake head");
                return Ok(head.to_vec());
            }
            if self.read_buf.len() > max_size {
                return Err(Error::HandshakeTooLarge {
                    size: self.read_buf.len(),
                    max: max_size,
                });
            }
            if self.fill_buf()? == 0 {
                return Err(Error::ConnectionClosed(None));
            }
        }
    }

    /// Read exactly one frame.
    ///
    /// The header is checked against the role's masking rule, the reserved
    /// bits, the control frame rules and the frame size limit before the
    /// payload is buffered.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the stream ends between frames
    /// - `FrameError::Truncated` if it ends inside a frame
    /// - frame, policy and transport errors
    pub fn read_frame(&mut self) -> Result<Frame> {
        let opts = DecodeOptions::default();

        loop {
            match FrameHeader::parse(&self.read_buf, &opts) {
                Ok(header) => {
                    self.validator.validate_header(&header)?;
                    let total = header.header_len + header.payload_len;
                    if self.read_buf.len() >= total {
                        let (frame, consumed) = Frame::parse_with(&self.read_buf[..total], &opts)?;
                        self.read_buf.advance(consumed);
                        trace!(
                            opcode = %frame.opcode,
                            fin = frame.fin,
                            len = frame.payload().len(),
                            "read frame"
                        );
                        return Ok(frame);
                    }
                    self.read_buf.reserve(total - self.read_buf.len());
                }
                Err(Error::IncompleteFrame { .. }) => {}
                Err(e) => return Err(e),
            }

            if self.fill_buf()? == 0 {
                return Err(if self.read_buf.is_empty() {
                    Error::ConnectionClosed(None)
                } else {
                    Error::Frame(FrameError::Truncated)
                });
            }
        }
    }

    /// Write one frame, masking it with a fresh key when acting as client.
    ///
    /// # Errors
    ///
    /// Returns transport errors from the stream.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.entropy.mask_key());

        self.write_buf.clear();
        self.write_buf.reserve(frame.wire_size(mask.is_some()));
        frame.encode(&mut self.write_buf, mask);

        trace!(
            opcode = %frame.opcode,
            fin = frame.fin,
            len = frame.payload().len(),
            "write frame"
        );
        self.io.write_all(&self.write_buf)?;
        Ok(())
    }

    /// Write bytes verbatim (handshake heads).
    ///
    /// # Errors
    ///
    /// Returns transport errors from the stream.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.io.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.io.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::protocol::OpCode;
    use std::collections::VecDeque;

    /// Serves queued input in chunks of at most `chunk` bytes; reports
    /// `WouldBlock` when drained unless `eof` is set.
    struct MockStream {
        input: VecDeque<u8>,
        chunk: usize,
        eof: bool,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(data: &[u8]) -> Self {
            Self {
                input: data.iter().copied().collect(),
                chunk: usize::MAX,
                eof: true,
                output: Vec::new(),
            }
        }

        fn chunked(mut self, chunk: usize) -> Self {
            self.chunk = chunk;
            self
        }

        fn open(mut self) -> Self {
            self.eof = false;
            self
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.input.is_empty() {
                return if self.eof {
                    Ok(0)
                } else {
                    Err(ErrorKind::WouldBlock.into())
                };
            }
            let n = buf.len().min(self.chunk).min(self.input.len());
            for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn masked(frame: &Frame) -> Vec<u8> {
        let mut buf = Vec::new();
        frame.encode(&mut buf, Some([0x37, 0xfa, 0x21, 0x3d]));
        buf
    }

    fn unmasked(frame: &Frame) -> Vec<u8> {
        let mut buf = Vec::new();
        frame.encode(&mut buf, None);
        buf
    }

    #[test]
    fn test_write_frame_masked_as_client() {
        let mut framed = FramedStream::new(
            MockStream::new(&[]),
            Role::Client,
            &Config::client().with_mask_seed(1),
        );
        framed.write_frame(&Frame::text("Hello")).unwrap();

        let written = &framed.get_ref().output;
        assert_eq!(written.len(), 11);
        assert_eq!(&written[..2], &[0x81, 0x85]);

        let (frame, _) = Frame::parse(written).unwrap();
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_write_frame_unmasked_as_server() {
        let mut framed = FramedStream::new(MockStream::new(&[]), Role::Server, &Config::server());
        framed.write_frame(&Frame::text("Hello")).unwrap();
        assert_eq!(
            framed.get_ref().output,
            vec![0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F]
        );
    }

    #[test]
    fn test_read_frames_across_small_reads() {
        let mut data = masked(&Frame::text("Hello"));
        data.extend(masked(&Frame::binary(vec![7u8; 300])));
        let stream = MockStream::new(&data).chunked(3);
        let mut framed = FramedStream::new(stream, Role::Server, &Config::server());

        let first = framed.read_frame().unwrap();
        assert_eq!(first.payload(), b"Hello");
        let second = framed.read_frame().unwrap();
        assert_eq!(second.opcode, OpCode::Binary);
        assert_eq!(second.payload().len(), 300);

        assert_eq!(framed.read_frame(), Err(Error::ConnectionClosed(None)));
    }

    #[test]
    fn test_read_truncated_frame() {
        let data = masked(&Frame::text("Hello"));
        let stream = MockStream::new(&data[..7]);
        let mut framed = FramedStream::new(stream, Role::Server, &Config::server());
        assert_eq!(
            framed.read_frame(),
            Err(Error::Frame(FrameError::Truncated))
        );
    }

    #[test]
    fn test_timeout_keeps_partial_frame() {
        let data = masked(&Frame::text("Hello"));
        let stream = MockStream::new(&data[..4]).open();
        let mut framed = FramedStream::new(stream, Role::Server, &Config::server());

        assert_eq!(framed.read_frame(), Err(Error::Timeout));
        assert_eq!(framed.buffered().len(), 4);

        framed.get_mut().input.extend(&data[4..]);
        assert_eq!(framed.read_frame().unwrap().payload(), b"Hello");
    }

    #[test]
    fn test_rejects_wrong_masking_direction() {
        let stream = MockStream::new(&unmasked(&Frame::text("Hi")));
        let mut server = FramedStream::new(stream, Role::Server, &Config::server());
        assert_eq!(server.read_frame(), Err(Error::UnmaskedClientFrame));

        let stream = MockStream::new(&masked(&Frame::text("Hi")));
        let mut client = FramedStream::new(stream, Role::Client, &Config::client());
        assert_eq!(client.read_frame(), Err(Error::MaskedServerFrame));
    }

    #[test]
    fn test_accepts_unmasked_when_configured() {
        let stream = MockStream::new(&unmasked(&Frame::text("Hi")));
        let config = Config::server().with_accept_unmasked_frames(true);
        let mut server = FramedStream::new(stream, Role::Server, &config);
        assert_eq!(server.read_frame().unwrap().payload(), b"Hi");
    }

    #[test]
    fn test_oversized_frame_rejected_from_header() {
        // Header claims 1 MiB; only the header is ever sent.
        let mut data = vec![0x82, 0x7f];
        data.extend((1u64 << 20).to_be_bytes());
        let config = Config::client().with_limits(Limits::embedded());
        let mut client = FramedStream::new(MockStream::new(&data).open(), Role::Client, &config);
        assert_eq!(
            client.read_frame(),
            Err(Error::FrameTooLarge {
                size: 1 << 20,
                max: 64 * 1024
            })
        );
    }

    #[test]
    fn test_reserved_opcode_rejected() {
        let stream = MockStream::new(&[0x83, 0x00]);
        let mut client = FramedStream::new(stream, Role::Client, &Config::client());
        assert_eq!(
            client.read_frame(),
            Err(Error::Frame(FrameError::InvalidOpcode(0x3)))
        );
    }

    #[test]
    fn test_read_handshake_keeps_leftover() {
        let mut data = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n".to_vec();
        data.extend(unmasked(&Frame::text("early")));
        let stream = MockStream::new(&data).chunked(5);
        let mut framed = FramedStream::new(stream, Role::Client, &Config::client());

        let head = framed.read_handshake(8192).unwrap();
        assert!(head.ends_with(b"\r\n\r\n"));
        assert_eq!(framed.read_frame().unwrap().payload(), b"early");
    }

    #[test]
    fn test_read_handshake_limits() {
        let data = vec![b'a'; 100];
        let mut framed = FramedStream::new(MockStream::new(&data), Role::Server, &Config::server());
        assert!(matches!(
            framed.read_handshake(50),
            Err(Error::HandshakeTooLarge { max: 50, .. })
        ));

        let mut framed = FramedStream::new(MockStream::new(b"GET /"), Role::Server, &Config::server());
        assert_eq!(framed.read_handshake(50), Err(Error::ConnectionClosed(None)));
    }
}
