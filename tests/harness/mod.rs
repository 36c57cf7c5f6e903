//! Shared fixtures for the integration tests: an in-memory stream and a
//! threaded echo server on loopback.

#![allow(dead_code)]

mod client;
mod mock;
mod server;

pub use client::connect;
pub use mock::MockStream;
pub use server::TestServer;
