//! Simple WebSocket client example.
//!
//! Run the echo server first: cargo run --example echo_server
//! Then run: cargo run --example client [ws://host:port/path]

use std::error::Error;
use std::net::TcpStream;
use std::time::Duration;

use wsync::{CloseCode, Config, Connection, Message, WsUri};

const DEFAULT_URI: &str = "ws://127.0.0.1:9001/";

fn main() -> Result<(), Box<dyn Error>> {
    let target = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URI.to_string());
    let uri = WsUri::parse(&target)?;
    if uri.is_secure() {
        return Err("this example speaks plain TCP; use a ws:// URI".into());
    }
    println!("Connecting to {uri}");

    let stream = TcpStream::connect(uri.socket_addr())?;
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;

    let config = Config::client().with_protocols(["echo"]);
    let mut conn = Connection::client(stream, &target, config)?;
    conn.initiate_handshake()?;
    conn.accept_handshake()?;
    println!("Handshake complete (protocol: {:?})", conn.protocol());

    let message = "Hello, WebSocket!";
    println!("Sending: {message}");
    conn.send_text(message)?;

    match conn.read()? {
        Message::Text(text) => println!("Received: {text}"),
        Message::Binary(data) => println!("Received binary: {} bytes", data.len()),
        other => println!("Received: {other:?}"),
    }

    println!("Closing connection...");
    match conn.close_and_wait(CloseCode::Normal, "goodbye")? {
        Some(frame) => println!("Server closed with {} {}", frame.code, frame.reason),
        None => println!("Server closed without a status"),
    }

    println!("Done");
    Ok(())
}
