//! Outgoing message fragmentation (RFC 6455 Section 5.4).

use std::slice::Chunks;

use crate::protocol::{Frame, OpCode};

/// Splits one data message into frames of at most `fragment_size` bytes.
///
/// The first frame carries the message opcode, the rest are
/// `OpCode::Continuation`, and only the last has FIN set. An empty payload
/// yields a single empty final frame.
#[derive(Debug)]
pub struct MessageFragmenter<'a> {
    chunks: Chunks<'a, u8>,
    opcode: OpCode,
    started: bool,
}

impl<'a> MessageFragmenter<'a> {
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            chunks: payload.chunks(fragment_size.max(1)),
            opcode,
            started: false,
        }
    }

    /// Number of frames still to be produced.
    #[must_use]
    pub fn frames_left(&self) -> usize {
        match self.chunks.len() {
            0 if !self.started => 1,
            n => n,
        }
    }
}

impl Iterator for MessageFragmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let opcode = if self.started {
            OpCode::Continuation
        } else {
            self.opcode
        };

        let chunk: &[u8] = match self.chunks.next() {
            Some(chunk) => chunk,
            None if !self.started => &[],
            None => return None,
        };
        self.started = true;

        let fin = self.chunks.len() == 0;
        Some(Frame::new(fin, opcode, chunk.to_vec()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.frames_left();
        (n, Some(n))
    }
}

impl ExactSizeIterator for MessageFragmenter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame_when_small() {
        let frames: Vec<_> = MessageFragmenter::new(b"Hello", OpCode::Text, 1024).collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
        assert_eq!(frames[0].opcode, OpCode::Text);
        assert_eq!(frames[0].payload(), b"Hello");
    }

    #[test]
    fn test_exact_fragmentation() {
        let payload = vec![0xAB; 30];
        let frames: Vec<_> = MessageFragmenter::new(&payload, OpCode::Binary, 10).collect();

        assert_eq!(frames.len(), 3);
        assert!(!frames[0].fin);
        assert_eq!(frames[0].opcode, OpCode::Binary);
        assert!(!frames[1].fin);
        assert_eq!(frames[1].opcode, OpCode::Continuation);
        assert!(frames[2].fin);
        assert_eq!(frames[2].opcode, OpCode::Continuation);
        assert!(frames.iter().all(|f| f.payload().len() == 10));
    }

    #[test]
    fn test_uneven_fragmentation() {
        let payload = vec![0xCD; 25];
        let frames: Vec<_> = MessageFragmenter::new(&payload, OpCode::Binary, 10).collect();

        let sizes: Vec<_> = frames.iter().map(|f| f.payload().len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert!(frames[2].fin);
    }

    #[test]
    fn test_empty_payload() {
        let frames: Vec<_> = MessageFragmenter::new(b"", OpCode::Text, 1024).collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
        assert_eq!(frames[0].opcode, OpCode::Text);
        assert!(frames[0].payload().is_empty());
    }

    #[test]
    fn test_payload_equals_fragment_size() {
        let payload = vec![0xEF; 100];
        let frames: Vec<_> = MessageFragmenter::new(&payload, OpCode::Binary, 100).collect();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].fin);
    }

    #[test]
    fn test_frames_left() {
        let payload = vec![0xAB; 30];
        let mut frag = MessageFragmenter::new(&payload, OpCode::Binary, 10);

        assert_eq!(frag.len(), 3);
        frag.next();
        assert_eq!(frag.frames_left(), 2);
        frag.next();
        frag.next();
        assert_eq!(frag.frames_left(), 0);
        assert!(frag.next().is_none());

        let empty = MessageFragmenter::new(b"", OpCode::Binary, 10);
        assert_eq!(empty.len(), 1);
    }

    #[test]
    fn test_reassembled_payload_matches() {
        let payload: Vec<u8> = (0..=255).cycle().take(1000).collect();
        let joined: Vec<u8> = MessageFragmenter::new(&payload, OpCode::Binary, 64)
            .flat_map(Frame::into_payload)
            .collect();
        assert_eq!(joined, payload);
    }
}
