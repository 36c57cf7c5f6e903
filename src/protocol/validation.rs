//! Incoming frame policy checks (RFC 6455).
//!
//! Everything here is decided from the frame header alone, so a bad frame is
//! rejected before its payload is buffered:
//! - Masking rules per RFC 6455 Section 5.1
//! - RSV bits (no extension is ever negotiated)
//! - Control frame rules per RFC 6455 Section 5.5
//! - Frame size limits

use crate::config::Limits;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};
use crate::protocol::opcode::OpCode;

/// Frame validator for incoming WebSocket frames.
///
/// Enforces RFC 6455 requirements based on connection role.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    role: Role,
    limits: Limits,
    accept_unmasked_frames: bool,
}

impl FrameValidator {
    /// Create a new frame validator for frames received by `role`.
    pub fn new(role: Role, limits: Limits) -> Self {
        Self {
            role,
            limits,
            accept_unmasked_frames: false,
        }
    }

    /// Accept unmasked frames on the server side (non-RFC compliant).
    #[must_use]
    pub fn with_accept_unmasked(mut self, accept: bool) -> Self {
        self.accept_unmasked_frames = accept;
        self
    }

    /// Validate a decoded header.
    ///
    /// Checks run in order: masking, reserved bits, control frame rules,
    /// frame size.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedClientFrame` - Server received unmasked frame from client
    /// - `Error::MaskedServerFrame` - Client received masked frame from server
    /// - `Error::ReservedBitsSet` - RSV bits set without negotiated extension
    /// - `Error::FragmentedControlFrame` - Control frame with FIN=0
    /// - `Error::ControlFrameTooLarge` - Control frame payload over 125 bytes
    /// - `Error::FrameTooLarge` - Frame exceeds size limit
    pub fn validate_header(&self, header: &FrameHeader) -> Result<()> {
        self.validate_masking(header.mask.is_some())?;
        check_frame_rules(header.fin, header.rsv, header.opcode, header.payload_len)?;
        self.limits.check_frame_size(header.payload_len)
    }

    fn validate_masking(&self, masked: bool) -> Result<()> {
        match self.role {
            Role::Server if !masked && !self.accept_unmasked_frames => {
                Err(Error::UnmaskedClientFrame)
            }
            Role::Client if masked => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }
}

/// Reserved-bit and control-frame rules shared by headers and whole frames.
///
/// # Errors
///
/// - `Error::ReservedBitsSet` if any RSV bit is set
/// - `Error::FragmentedControlFrame` for a control frame with FIN=0
/// - `Error::ControlFrameTooLarge` for a control payload over 125 bytes
pub fn check_frame_rules(fin: bool, rsv: u8, opcode: OpCode, payload_len: usize) -> Result<()> {
    if rsv != 0 {
        return Err(Error::ReservedBitsSet);
    }

    if opcode.is_control() {
        if !fin {
            return Err(Error::FragmentedControlFrame);
        }
        if payload_len > MAX_CONTROL_FRAME_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload_len));
        }
    }
    Ok(())
}
