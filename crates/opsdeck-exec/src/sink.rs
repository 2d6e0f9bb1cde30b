//! Bounded capture buffer for a child's combined output.

use bytes::{Bytes, BytesMut};

/// Collects stdout and stderr chunks in arrival order up to a byte cap.
///
/// Bytes past the cap are dropped and `truncated` is set.
#[derive(Debug)]
pub struct OutputSink {
    buf: BytesMut,
    limit: usize,
    truncated: bool,
}

impl OutputSink {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit.min(8 * 1024)),
            limit,
            truncated: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.buf.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// Captured output as text; invalid UTF-8 is replaced.
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_arrival_order() {
        let mut sink = OutputSink::new(64);
        sink.push(b"out ");
        sink.push(b"err ");
        sink.push(b"out");
        assert!(!sink.truncated());
        assert_eq!(sink.into_string(), "out err out");
    }

    #[test]
    fn test_caps_and_flags() {
        let mut sink = OutputSink::new(5);
        sink.push(b"abc");
        sink.push(b"defgh");
        sink.push(b"ijk");
        assert!(sink.truncated());
        assert_eq!(sink.len(), 5);
        assert_eq!(&sink.into_bytes()[..], b"abcde");
    }

    #[test]
    fn test_exact_fit_is_not_truncated() {
        let mut sink = OutputSink::new(4);
        sink.push(b"abcd");
        sink.push(b"");
        assert!(!sink.truncated());
    }

    #[test]
    fn test_lossy_text() {
        let mut sink = OutputSink::new(16);
        sink.push(&[b'o', b'k', 0xff]);
        assert_eq!(sink.into_string(), "ok\u{fffd}");
    }
}
