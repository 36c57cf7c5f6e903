//! Threaded echo server on an ephemeral loopback port.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wsync::{Config, Connection, Message, Result};

pub struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<Vec<Result<usize>>>,
}

impl TestServer {
    /// Serve `connections` clients, each on its own thread, then stop.
    pub fn spawn(connections: usize, config: Config) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");

        let handle = thread::spawn(move || {
            let mut sessions = Vec::with_capacity(connections);
            for _ in 0..connections {
                let (stream, _) = listener.accept().expect("accept");
                let config = config.clone();
                sessions.push(thread::spawn(move || echo(stream, config)));
            }
            sessions
                .into_iter()
                .map(|s| s.join().expect("session thread panicked"))
                .collect()
        });

        Self { addr, handle }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for every session; each result is the number of messages echoed.
    pub fn join(self) -> Vec<Result<usize>> {
        self.handle.join().expect("server thread panicked")
    }
}

fn echo(stream: TcpStream, config: Config) -> Result<usize> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut conn = Connection::server(stream, config);
    conn.initiate_handshake()?;

    let mut echoed = 0;
    loop {
        match conn.read()? {
            Message::Text(text) => conn.send_text(&text)?,
            Message::Binary(data) => conn.send_binary(&data)?,
            Message::Close(_) => return Ok(echoed),
            Message::Ping(_) | Message::Pong(_) => continue,
        }
        echoed += 1;
    }
}
