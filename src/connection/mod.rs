//! WebSocket connection management and state machine.
//!
//! ## Connection Lifecycle
//!
//! 1. **Closed** - initial state, and the final one
//! 2. **Connecting** - client has sent its upgrade request
//! 3. **Open** - handshake complete, messages flow both ways
//! 4. **Closing** - Close frame sent, waiting for the peer's Close
//!
//! ## Example
//!
//! ```no_run
//! use std::net::TcpListener;
//! use wsync::{Config, Connection, Message};
//!
//! # fn main() -> wsync::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:9001")?;
//! let (stream, _) = listener.accept()?;
//! let mut conn = Connection::server(stream, Config::server());
//! conn.initiate_handshake()?;
//!
//! loop {
//!     match conn.read()? {
//!         Message::Text(text) => conn.send_text(&text)?,
//!         Message::Binary(data) => conn.send_binary(&data)?,
//!         Message::Close(_) => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod fragmenter;
mod role;
mod state;

pub use fragmenter::MessageFragmenter;
pub use role::Role;
pub use state::ConnectionState;

#[allow(clippy::module_inception)]
mod connection;

pub use connection::Connection;
