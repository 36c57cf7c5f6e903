//! Simple WebSocket echo server example.
//!
//! Run with: cargo run --example echo_server
//! Then connect with: cargo run --example client

use std::error::Error;
use std::net::{TcpListener, TcpStream};
use std::thread;

use wsync::{Config, Connection, Message};

const ADDR: &str = "127.0.0.1:9001";

fn main() -> Result<(), Box<dyn Error>> {
    println!("WebSocket Echo Server listening on {ADDR}");

    let listener = TcpListener::bind(ADDR)?;

    for stream in listener.incoming() {
        let stream = stream?;
        let addr = stream.peer_addr()?;
        println!("New connection from: {addr}");

        thread::spawn(move || {
            if let Err(e) = handle_connection(stream) {
                eprintln!("Connection error from {addr}: {e}");
            }
        });
    }
    Ok(())
}

fn handle_connection(stream: TcpStream) -> wsync::Result<()> {
    let config = Config::server().with_protocols(["echo"]);
    let mut conn = Connection::server(stream, config);
    conn.initiate_handshake()?;
    println!(
        "  Handshake complete for path {} (protocol: {:?})",
        conn.resource().unwrap_or("/"),
        conn.protocol()
    );

    loop {
        match conn.read()? {
            Message::Text(text) => {
                println!("  Received text: {text}");
                conn.send_text(&text)?;
            }
            Message::Binary(data) => {
                println!("  Received binary: {} bytes", data.len());
                conn.send_binary(&data)?;
            }
            Message::Close(frame) => {
                match frame {
                    Some(cf) => println!("  Received close: {} - {}", cf.code, cf.reason),
                    None => println!("  Received close (no code)"),
                }
                break;
            }
            // Pings are answered inside read(); pongs never surface
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    println!("  Session ended");
    Ok(())
}
