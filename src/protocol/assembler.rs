//! Message reassembly for WebSocket (RFC 6455).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented WebSocket messages.
///
/// Text payloads are UTF-8 validated fragment by fragment. Any error clears
/// the partial message.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    utf8_validator: Option<Utf8Validator>,
    limits: Limits,
}

impl MessageAssembler {
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            utf8_validator: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns `Some(message)` once a frame with FIN=1 completes it. Control
    /// frames are ignored.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a Continuation with no message in
    ///   progress, or a new data frame while one is in progress
    /// - `Error::InvalidUtf8` for malformed text
    /// - `Error::MessageTooLarge` / `Error::TooManyFragments` on limit breach
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        let result = self.accept(frame);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn accept(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }

        if frame.opcode == OpCode::Continuation {
            if self.opcode.is_none() {
                return Err(Error::ProtocolViolation(
                    "Unexpected continuation frame".into(),
                ));
            }
        } else {
            if self.opcode.is_some() {
                return Err(Error::ProtocolViolation(
                    "Expected continuation frame".into(),
                ));
            }
            self.opcode = Some(frame.opcode);

            if frame.opcode == OpCode::Text {
                self.utf8_validator = Some(Utf8Validator::new());
            }
        }

        self.limits.check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if let Some(validator) = self.utf8_validator.as_mut() {
            validator.validate(frame.payload(), frame.fin)?;
        }

        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }

        let Some(opcode) = self.opcode.take() else {
            return Ok(None);
        };
        let payload = self.buffer.split().to_vec();
        self.fragment_count = 0;
        self.utf8_validator = None;
        Ok(Some(AssembledMessage { opcode, payload }))
    }

    /// Whether a fragmented message is in progress.
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
        self.utf8_validator = None;
    }
}

/// A fully assembled WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl AssembledMessage {
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.payload).map_err(|_| Error::InvalidUtf8)
    }

    pub fn into_binary(self) -> Vec<u8> {
        self.payload
    }
}
