//! WebSocket frame opcodes as defined in RFC 6455.

use crate::error::FrameError;

/// WebSocket frame opcode.
///
/// Defines the interpretation of the payload data. `Reserved` carries the raw
/// 4-bit value of an opcode RFC 6455 leaves undefined; it is only produced
/// when the decoder has been told to tolerate such frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Continuation frame (0x0).
    ///
    /// Used for fragmented messages after the initial frame.
    Continuation,

    /// Text frame (0x1).
    ///
    /// Payload must be valid UTF-8.
    Text,

    /// Binary frame (0x2).
    Binary,

    /// Close frame (0x8).
    ///
    /// Initiates connection close. May contain status code and reason.
    Close,

    /// Ping frame (0x9).
    ///
    /// Receiver must respond with Pong.
    Ping,

    /// Pong frame (0xA).
    ///
    /// Response to Ping. May be sent unsolicited as unidirectional heartbeat.
    Pong,

    /// Reserved opcode (0x3-0x7, 0xB-0xF).
    Reserved(u8),
}

impl OpCode {
    /// Decode the low 4 bits of `byte` into an opcode.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::InvalidOpcode` for reserved values.
    pub fn from_u8(byte: u8) -> Result<Self, FrameError> {
        match Self::from_u8_lenient(byte) {
            OpCode::Reserved(value) => Err(FrameError::InvalidOpcode(value)),
            opcode => Ok(opcode),
        }
    }

    /// Decode the low 4 bits of `byte`, mapping undefined values to
    /// [`OpCode::Reserved`].
    #[must_use]
    pub const fn from_u8_lenient(byte: u8) -> Self {
        match byte & 0x0F {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }

    /// Convert OpCode to raw 4-bit value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Reserved(value) => value & 0x0F,
        }
    }

    /// Check if this is a control frame opcode.
    ///
    /// Control opcodes have the high bit of the nibble set, so reserved
    /// values 0xB-0xF count as control.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.as_u8() & 0x8 != 0
    }

    /// Check if this is a data frame opcode.
    ///
    /// Data frames: Continuation (0x0), Text (0x1), Binary (0x2).
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, OpCode::Continuation | OpCode::Text | OpCode::Binary)
    }

    /// Check if this opcode is undefined by RFC 6455.
    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self, OpCode::Reserved(_))
    }

    /// Get human-readable name for this opcode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
            OpCode::Reserved(_) => "Reserved",
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpCode::Reserved(value) => write!(f, "Reserved({value:#x})"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_from_u8_valid() {
        assert_eq!(OpCode::from_u8(0x0).unwrap(), OpCode::Continuation);
        assert_eq!(OpCode::from_u8(0x1).unwrap(), OpCode::Text);
        assert_eq!(OpCode::from_u8(0x2).unwrap(), OpCode::Binary);
        assert_eq!(OpCode::from_u8(0x8).unwrap(), OpCode::Close);
        assert_eq!(OpCode::from_u8(0x9).unwrap(), OpCode::Ping);
        assert_eq!(OpCode::from_u8(0xA).unwrap(), OpCode::Pong);
    }

    #[test]
    fn test_opcode_from_u8_reserved() {
        for reserved in [0x3, 0x4, 0x5, 0x6, 0x7, 0xB, 0xC, 0xD, 0xE, 0xF] {
            assert_eq!(
                OpCode::from_u8(reserved),
                Err(FrameError::InvalidOpcode(reserved))
            );
            assert_eq!(OpCode::from_u8_lenient(reserved), OpCode::Reserved(reserved));
        }
    }

    #[test]
    fn test_opcode_as_u8_round_trips() {
        for value in 0u8..16 {
            assert_eq!(OpCode::from_u8_lenient(value).as_u8(), value);
        }
    }

    #[test]
    fn test_opcode_is_control() {
        assert!(!OpCode::Continuation.is_control());
        assert!(!OpCode::Text.is_control());
        assert!(!OpCode::Binary.is_control());
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(OpCode::Pong.is_control());
        assert!(OpCode::Reserved(0xB).is_control());
        assert!(!OpCode::Reserved(0x3).is_control());
    }

    #[test]
    fn test_opcode_is_data() {
        assert!(OpCode::Continuation.is_data());
        assert!(OpCode::Text.is_data());
        assert!(OpCode::Binary.is_data());
        assert!(!OpCode::Close.is_data());
        assert!(!OpCode::Reserved(0x3).is_data());
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(OpCode::Text.to_string(), "Text");
        assert_eq!(OpCode::Close.to_string(), "Close");
        assert_eq!(OpCode::Reserved(0xC).to_string(), "Reserved(0xc)");
    }
}
