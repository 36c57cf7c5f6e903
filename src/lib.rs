//! # wsync - Synchronous WebSocket Protocol Implementation
//!
//! `wsync` is an RFC 6455 WebSocket framing and handshake layer for blocking
//! byte streams. It owns no sockets and runs no event loop: a [`Connection`]
//! wraps any `Read + Write` stream and is driven by explicit calls.
//!
//! ## Features
//!
//! - **Frame codec** for buffers and streams, with masking and all three
//!   length encodings
//! - **Opening handshake** for both roles, with origin checks and
//!   subprotocol selection
//! - **Incremental UTF-8 validation** of fragmented text messages
//! - **Close handshake** with status codes and reasons
//! - **Resource limits** on frames, messages, fragments and handshake size
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::net::TcpStream;
//! use wsync::{Config, Connection, Message};
//!
//! # fn main() -> wsync::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:9001")?;
//! let mut conn = Connection::client(stream, "ws://127.0.0.1:9001/", Config::client())?;
//! conn.initiate_handshake()?;
//! conn.accept_handshake()?;
//!
//! conn.send_message(&Message::text("Hello"))?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod rng;
pub mod uri;

pub use codec::FramedStream;
pub use config::{Config, Limits};
pub use connection::{Connection, ConnectionState, Role};
pub use error::{Error, FrameError, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{Frame, OpCode, WS_GUID, compute_accept_key};
pub use uri::WsUri;
