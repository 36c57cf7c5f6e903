//! Frame-level I/O over blocking byte streams.

mod framed;

pub use framed::FramedStream;
