//! Application-facing message types and close status codes (RFC 6455).

use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::utf8::validate_utf8;

/// Maximum close reason length: a control payload of 125 bytes minus the code.
pub const MAX_CLOSE_REASON: usize = 123;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CloseCode {
    /// Normal closure (1000).
    #[default]
    Normal,
    /// Going away (1001), e.g. server shutdown.
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003).
    UnsupportedData,
    /// Invalid payload (1007), e.g. non-UTF-8 in a text message.
    InvalidPayload,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    MessageTooBig,
    /// Mandatory extension (1010).
    MandatoryExtension,
    /// Internal error (1011).
    InternalError,
    /// Any other code, valid or not.
    Other(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::MessageTooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    /// Numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Whether this code may appear in a Close frame (RFC 6455 Section 7.4.1).
    ///
    /// Valid: 1000-1003, 1007-1014, 3000-4999.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1014 | 3000..=4999)
    }

    /// Whether this code is reserved for local use and must never be sent:
    /// 1004, 1005 (no status), 1006 (abnormal closure), 1015 (TLS failure).
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), 1004..=1006 | 1015)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode::from_u16(code)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Status code and reason carried by a Close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason (UTF-8, at most 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Decode a received Close payload.
    ///
    /// An empty payload carries no status and yields `None`.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a 1-byte payload
    /// - `Error::InvalidCloseCode` for codes that may not be sent
    /// - `Error::InvalidUtf8` if the reason is not UTF-8
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        match payload {
            [] => Ok(None),
            [_] => Err(Error::ProtocolViolation(
                "Close payload of 1 byte".into(),
            )),
            [hi, lo, reason @ ..] => {
                let code = CloseCode::from_u16(u16::from_be_bytes([*hi, *lo]));
                if !code.is_valid() {
                    return Err(Error::InvalidCloseCode(code.as_u16()));
                }
                validate_utf8(reason)?;
                let reason = String::from_utf8_lossy(reason).into_owned();
                Ok(Some(Self { code, reason }))
            }
        }
    }

    /// Encode as a Close payload: code in network byte order, then the reason.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` for codes that may not be sent
    /// - `Error::InvalidFrame` if the reason exceeds 123 bytes
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        if !self.code.is_valid() {
            return Err(Error::InvalidCloseCode(self.code.as_u16()));
        }
        if self.reason.len() > MAX_CLOSE_REASON {
            return Err(Error::InvalidFrame(format!(
                "Close reason too long: {} bytes (max: {MAX_CLOSE_REASON})",
                self.reason.len()
            )));
        }

        let mut payload = Vec::with_capacity(2 + self.reason.len());
        payload.extend_from_slice(&self.code.as_u16().to_be_bytes());
        payload.extend_from_slice(self.reason.as_bytes());
        Ok(payload)
    }
}

/// WebSocket message types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A text message (UTF-8 encoded).
    Text(String),
    /// A binary message (arbitrary bytes).
    Binary(Vec<u8>),
    /// A ping (payload <= 125 bytes).
    Ping(Vec<u8>),
    /// A pong (payload <= 125 bytes).
    Pong(Vec<u8>),
    /// A close, with the status the peer sent, if any.
    Close(Option<CloseFrame>),
}

impl Message {
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Message::Ping(data.into())
    }

    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Message::Pong(data.into())
    }

    #[must_use]
    pub fn close(code: CloseCode, reason: impl Into<String>) -> Self {
        Message::Close(Some(CloseFrame::new(code, reason)))
    }

    /// Returns `true` for text and binary messages.
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Message::Text(_) | Message::Binary(_))
    }

    /// Returns `true` for ping, pong and close.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        !self.is_data()
    }

    /// Returns `true` for a close message.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Message::Close(_))
    }

    /// Consume and return the text content, if this is a text message.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Message::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the payload bytes. Close messages have none.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Text(s) => s.as_bytes(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data,
            Message::Close(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::text("hello"), Message::Text("hello".into()));
        assert_eq!(Message::binary([4, 5, 6]), Message::Binary(vec![4, 5, 6]));
        assert_eq!(Message::ping(vec![1]), Message::Ping(vec![1]));
        assert_eq!(Message::pong(vec![2]), Message::Pong(vec![2]));
        assert_eq!(
            Message::close(CloseCode::Normal, "bye"),
            Message::Close(Some(CloseFrame::new(CloseCode::Normal, "bye")))
        );
    }

    #[test]
    fn test_message_kinds() {
        assert!(Message::text("hello").is_data());
        assert!(Message::binary(vec![1]).is_data());
        assert!(Message::ping(vec![]).is_control());
        assert!(Message::pong(vec![]).is_control());
        assert!(Message::Close(None).is_control());
        assert!(Message::Close(None).is_close());
        assert!(!Message::text("x").is_close());
    }

    #[test]
    fn test_message_accessors() {
        assert_eq!(Message::text("hello").into_text(), Some("hello".into()));
        assert_eq!(Message::binary(vec![1]).into_text(), None);
        assert_eq!(Message::text("hi").as_bytes(), b"hi");
        assert_eq!(Message::ping(vec![7]).as_bytes(), &[7]);
        assert!(Message::Close(None).as_bytes().is_empty());
    }

    #[test]
    fn test_close_code_round_trip() {
        for code in [1000, 1001, 1002, 1003, 1007, 1008, 1009, 1010, 1011, 3000, 4999] {
            assert_eq!(CloseCode::from_u16(code).as_u16(), code);
        }
        assert_eq!(CloseCode::from(1009), CloseCode::MessageTooBig);
        assert_eq!(CloseCode::Other(3500).to_string(), "3500");
    }

    #[test]
    fn test_close_code_validity() {
        for valid in [1000, 1003, 1007, 1011, 1012, 1013, 1014, 3000, 4999] {
            assert!(CloseCode::from_u16(valid).is_valid(), "{}", valid);
        }
        for invalid in [0, 999, 1004, 1005, 1006, 1015, 1016, 2999, 5000] {
            assert!(!CloseCode::from_u16(invalid).is_valid(), "{}", invalid);
        }
    }

    #[test]
    fn test_close_code_reserved() {
        for reserved in [1004, 1005, 1006, 1015] {
            assert!(CloseCode::Other(reserved).is_reserved());
        }
        assert!(!CloseCode::Normal.is_reserved());
        assert!(!CloseCode::Other(1012).is_reserved());
    }

    #[test]
    fn test_close_frame_parse() {
        assert_eq!(CloseFrame::parse(&[]), Ok(None));
        assert_eq!(
            CloseFrame::parse(&[0x03, 0xe8, b'o', b'k']),
            Ok(Some(CloseFrame::new(CloseCode::Normal, "ok")))
        );
        assert!(matches!(
            CloseFrame::parse(&[0x03]),
            Err(Error::ProtocolViolation(_))
        ));
        // 1005 may not appear on the wire
        assert_eq!(
            CloseFrame::parse(&[0x03, 0xed]),
            Err(Error::InvalidCloseCode(1005))
        );
        assert_eq!(
            CloseFrame::parse(&[0x03, 0xe8, 0xff]),
            Err(Error::InvalidUtf8)
        );
    }

    #[test]
    fn test_close_frame_to_payload() {
        let frame = CloseFrame::new(CloseCode::GoingAway, "bye");
        assert_eq!(frame.to_payload().unwrap(), vec![0x03, 0xe9, b'b', b'y', b'e']);

        let long = CloseFrame::new(CloseCode::Normal, "x".repeat(124));
        assert!(matches!(long.to_payload(), Err(Error::InvalidFrame(_))));
        let max = CloseFrame::new(CloseCode::Normal, "x".repeat(123));
        assert_eq!(max.to_payload().unwrap().len(), 125);

        let reserved = CloseFrame::new(CloseCode::Other(1006), "");
        assert_eq!(reserved.to_payload(), Err(Error::InvalidCloseCode(1006)));
    }
}
