//! Fixed-capacity circular byte buffer.

use parking_lot::Mutex;

struct State {
    data: Box<[u8]>,
    head: usize,
    len: usize,
}

impl State {
    fn tail(&self) -> usize {
        (self.head + self.len) % self.data.len().max(1)
    }

    /// Copy up to `out.len()` stored bytes without consuming them.
    fn copy_out(&self, out: &mut [u8]) -> usize {
        let capacity = self.data.len();
        let count = out.len().min(self.len);
        let first = count.min(capacity - self.head);
        out[..first].copy_from_slice(&self.data[self.head..self.head + first]);
        out[first..count].copy_from_slice(&self.data[..count - first]);
        count
    }

    fn advance(&mut self, count: usize) {
        if self.data.is_empty() {
            return;
        }
        self.head = (self.head + count) % self.data.len();
        self.len -= count;
        if self.len == 0 {
            self.head = 0;
        }
    }
}

/// Circular byte buffer with clamped operations.
///
/// The capacity is fixed at construction. Every operation takes one internal
/// lock, so one writer and one reader may share a buffer across threads.
pub struct RingBuffer {
    state: Mutex<State>,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                data: vec![0; capacity].into_boxed_slice(),
                head: 0,
                len: 0,
            }),
        }
    }

    /// Append as much of `data` as fits. Returns the number of bytes stored.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut state = self.state.lock();
        let capacity = state.data.len();
        let count = data.len().min(capacity - state.len);
        if count == 0 {
            return 0;
        }

        let tail = state.tail();
        let first = count.min(capacity - tail);
        state.data[tail..tail + first].copy_from_slice(&data[..first]);
        state.data[..count - first].copy_from_slice(&data[first..count]);
        state.len += count;
        count
    }

    /// Move up to `out.len()` bytes into `out`. Returns the number copied.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        let count = state.copy_out(out);
        state.advance(count);
        count
    }

    /// Like [`RingBuffer::read`] but leaves the bytes in place.
    pub fn peek(&self, out: &mut [u8]) -> usize {
        self.state.lock().copy_out(out)
    }

    /// Discard up to `count` bytes. Returns the number discarded.
    pub fn skip(&self, count: usize) -> usize {
        let mut state = self.state.lock();
        let count = count.min(state.len);
        state.advance(count);
        count
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().data.len()
    }

    /// Number of stored bytes.
    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    /// Free space remaining.
    pub fn available_space(&self) -> usize {
        let state = self.state.lock();
        state.data.len() - state.len
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().len == 0
    }

    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        state.len == state.data.len()
    }

    /// Drop all stored bytes.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.head = 0;
        state.len = 0;
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &state.data.len())
            .field("len", &state.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_write_clamps_to_capacity() {
        let buf = RingBuffer::new(4);
        assert_eq!(buf.write(b"abcdef"), 4);
        assert!(buf.is_full());
        assert_eq!(buf.write(b"g"), 0);
        assert_eq!(buf.available_space(), 0);
    }

    #[test]
    fn test_read_peek_skip() {
        let buf = RingBuffer::new(8);
        buf.write(b"hello");

        let mut out = [0u8; 3];
        assert_eq!(buf.peek(&mut out), 3);
        assert_eq!(&out, b"hel");
        assert_eq!(buf.len(), 5);

        assert_eq!(buf.skip(1), 1);
        assert_eq!(buf.read(&mut out), 3);
        assert_eq!(&out, b"ell");
        assert_eq!(buf.skip(10), 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_wrap_around() {
        let buf = RingBuffer::new(5);
        buf.write(b"abcd");
        let mut out = [0u8; 3];
        buf.read(&mut out);
        assert_eq!(buf.write(b"efgh"), 4);
        assert!(buf.is_full());

        let mut all = [0u8; 8];
        let n = buf.read(&mut all);
        assert_eq!(&all[..n], b"defgh");
    }

    #[test]
    fn test_clear_and_zero_capacity() {
        let buf = RingBuffer::new(3);
        buf.write(b"xyz");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 3);

        let empty = RingBuffer::new(0);
        assert_eq!(empty.write(b"a"), 0);
        assert_eq!(empty.skip(1), 0);
        assert!(empty.is_full() && empty.is_empty());
    }

    #[test]
    fn test_single_producer_single_consumer() {
        let buf = Arc::new(RingBuffer::new(16));
        let input: Vec<u8> = (0..=255).cycle().take(4096).collect();

        let writer = {
            let buf = Arc::clone(&buf);
            let input = input.clone();
            thread::spawn(move || {
                let mut offset = 0;
                while offset < input.len() {
                    offset += buf.write(&input[offset..]);
                    thread::yield_now();
                }
            })
        };

        let mut output = Vec::with_capacity(input.len());
        let mut chunk = [0u8; 7];
        while output.len() < input.len() {
            let n = buf.read(&mut chunk);
            output.extend_from_slice(&chunk[..n]);
            thread::yield_now();
        }
        writer.join().unwrap();
        assert_eq!(output, input);
    }
}
