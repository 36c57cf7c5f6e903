//! Loopback client setup.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use wsync::{Config, Connection, Result};

/// Connect to `addr` and complete the opening handshake for `path`.
pub fn connect(addr: SocketAddr, path: &str, config: Config) -> Result<Connection<TcpStream>> {
    let stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    let uri = format!("ws://{addr}{path}");
    let mut conn = Connection::client(stream, &uri, config)?;
    conn.initiate_handshake()?;
    conn.accept_handshake()?;
    Ok(conn)
}
