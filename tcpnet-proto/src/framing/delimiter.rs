//! Delimiter framing: `payload` followed by a terminator sequence.

use super::MessageFramer;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

/// Framer that terminates each message with a fixed byte sequence.
///
/// An empty delimiter means "no framing": [`MessageFramer::frame`] passes the
/// payload through and [`MessageFramer::unframe`] never emits, retaining
/// everything it is given.
pub struct DelimiterFramer {
    delimiter: Vec<u8>,
    include_delimiter: bool,
    buffer: Mutex<BytesMut>,
}

impl DelimiterFramer {
    pub fn new(delimiter: impl Into<Vec<u8>>) -> Self {
        Self {
            delimiter: delimiter.into(),
            include_delimiter: false,
            buffer: Mutex::new(BytesMut::new()),
        }
    }

    /// Keep the delimiter at the end of every emitted message.
    #[must_use]
    pub fn with_include_delimiter(mut self, include: bool) -> Self {
        self.include_delimiter = include;
        self
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    fn find(&self, haystack: &[u8]) -> Option<usize> {
        if self.delimiter.is_empty() || haystack.len() < self.delimiter.len() {
            return None;
        }
        haystack
            .windows(self.delimiter.len())
            .position(|window| window == self.delimiter.as_slice())
    }
}

impl std::fmt::Debug for DelimiterFramer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelimiterFramer")
            .field("delimiter", &self.delimiter)
            .field("include_delimiter", &self.include_delimiter)
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl MessageFramer for DelimiterFramer {
    fn frame(&self, payload: &[u8]) -> anyhow::Result<Bytes> {
        let mut out = BytesMut::with_capacity(payload.len() + self.delimiter.len());
        out.extend_from_slice(payload);
        out.extend_from_slice(&self.delimiter);
        Ok(out.freeze())
    }

    fn unframe(&self, data: &[u8]) -> Vec<Bytes> {
        let mut buffer = self.buffer.lock();
        buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(pos) = self.find(&buffer) {
            let mut message = buffer.split_to(pos + self.delimiter.len());
            if !self.include_delimiter {
                message.truncate(pos);
            }
            messages.push(message.freeze());
        }
        messages
    }

    fn is_complete(&self, data: &[u8]) -> bool {
        self.find(data).is_some()
    }

    fn reset(&self) {
        self.buffer.lock().clear();
    }

    fn pending_len(&self) -> usize {
        self.buffer.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_crlf_single_chunk() {
        let framer = DelimiterFramer::new(b"\r\n".to_vec());
        assert_eq!(framer.unframe(b"a\r\nb\r\n"), vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_crlf_split_across_calls() {
        let framer = DelimiterFramer::new(b"\r\n".to_vec());
        assert_eq!(framer.unframe(b"a\r\n"), vec![&b"a"[..]]);
        assert_eq!(framer.unframe(b"b\r\n"), vec![&b"b"[..]]);
    }

    #[test]
    fn test_delimiter_split_between_chunks() {
        let framer = DelimiterFramer::new(b"\r\n".to_vec());
        assert!(framer.unframe(b"hello\r").is_empty());
        assert_eq!(framer.unframe(b"\nworld"), vec![&b"hello"[..]]);
        assert_eq!(framer.pending_len(), 5);
    }

    #[test]
    fn test_include_delimiter() {
        let framer = DelimiterFramer::new(b"|".to_vec()).with_include_delimiter(true);
        assert_eq!(framer.unframe(b"x|y|"), vec![&b"x|"[..], &b"y|"[..]]);
    }

    #[test]
    fn test_empty_delimiter_never_emits() {
        let framer = DelimiterFramer::new(Vec::new());
        assert_eq!(&framer.frame(b"raw").unwrap()[..], b"raw");
        assert!(framer.unframe(b"abc").is_empty());
        assert!(!framer.is_complete(b"abc"));
        assert_eq!(framer.pending_len(), 3);
    }

    #[test]
    fn test_frame_appends_delimiter() {
        let framer = DelimiterFramer::new(b"\n".to_vec());
        assert_eq!(&framer.frame(b"line").unwrap()[..], b"line\n");
        assert!(framer.is_complete(b"line\n"));
        assert!(!framer.is_complete(b"line"));
    }

    #[test]
    fn test_empty_messages_between_delimiters() {
        let framer = DelimiterFramer::new(b";".to_vec());
        assert_eq!(framer.unframe(b";;a;"), vec![&b""[..], &b""[..], &b"a"[..]]);
    }
}
