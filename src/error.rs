//! Error types for the WebSocket protocol implementation.
//!
//! Every failure is reported synchronously by the call that detected it. The
//! variants group into transport, handshake, frame, encoding, protocol and
//! state errors; [`Error::close_code`] tells the connection which status to
//! put in the best-effort Close frame when the error is fatal.

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural failures of the wire frame codec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FrameError {
    /// The stream ended before the whole frame was available.
    #[error("Truncated frame")]
    Truncated,

    /// Reserved or undefined opcode.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// 64-bit payload length with the most significant bit set.
    #[error("Invalid payload length: {0}")]
    InvalidLength(u64),

    /// Declared payload length exceeds the decoder limit.
    #[error("Frame payload too large: {size} bytes (max: {max})")]
    TooLarge {
        /// Declared payload length.
        size: u64,
        /// Maximum accepted payload length.
        max: usize,
    },
}

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Structurally invalid frame read from the wire.
    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),

    /// Invalid frame structure on the sending side.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in a text payload or close reason.
    #[error("Invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// The peer closed the underlying stream.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// The operation requires an open connection.
    #[error("Connection not open (state: {0})")]
    NotOpen(ConnectionState),

    /// The operation is not permitted in the current state.
    #[error("Operation not permitted in state {0}")]
    InvalidState(ConnectionState),

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake head exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Header value cannot be emitted safely.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Origin rejected by the server allow-list.
    #[error("Origin not allowed: {origin}")]
    OriginNotAllowed {
        /// The offending Origin value.
        origin: String,
    },

    /// Target URI is not a usable WebSocket URI.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A read or write timed out; the connection state is unchanged.
    #[error("I/O timed out")]
    Timeout,

    /// Invalid close code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked client frame (security violation).
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Masked server frame (security violation).
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data in a buffer.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },
}

impl Error {
    /// Returns `true` for errors caused by the transport rather than the peer's
    /// protocol behaviour.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Timeout | Error::ConnectionClosed(_)
        )
    }

    /// Status code to send when this error tears down an open connection.
    ///
    /// Returns `None` for errors that are not the peer's fault or after which
    /// nothing can be written.
    #[must_use]
    pub const fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::InvalidUtf8 => Some(CloseCode::InvalidPayload),
            Error::MessageTooLarge { .. }
            | Error::FrameTooLarge { .. }
            | Error::TooManyFragments { .. }
            | Error::Frame(FrameError::TooLarge { .. }) => Some(CloseCode::MessageTooBig),
            Error::Frame(FrameError::Truncated) => None,
            Error::Frame(_)
            | Error::ProtocolViolation(_)
            | Error::InvalidCloseCode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::UnmaskedClientFrame
            | Error::MaskedServerFrame
            | Error::ReservedBitsSet => Some(CloseCode::ProtocolError),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Io(err.to_string()),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
