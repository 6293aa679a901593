//! Length-prefixed framing: `[length][payload]`.

use super::MessageFramer;
use anyhow::bail;
use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Width of the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthType {
    U8,
    U16,
    #[default]
    U32,
    U64,
}

impl LengthType {
    /// Prefix size in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Largest payload length the prefix can express.
    pub const fn max_len(self) -> u64 {
        match self {
            Self::U8 => u8::MAX as u64,
            Self::U16 => u16::MAX as u64,
            Self::U32 => u32::MAX as u64,
            Self::U64 => u64::MAX,
        }
    }
}

/// Byte order of the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

#[derive(Default)]
struct State {
    buffer: BytesMut,
    /// Declared length of the message currently being assembled.
    expected: Option<usize>,
}

/// Framer that prefixes each payload with its length.
pub struct LengthPrefixedFramer {
    length_type: LengthType,
    endianness: Endianness,
    state: Mutex<State>,
}

impl LengthPrefixedFramer {
    pub fn new(length_type: LengthType, endianness: Endianness) -> Self {
        Self {
            length_type,
            endianness,
            state: Mutex::new(State::default()),
        }
    }

    pub fn length_type(&self) -> LengthType {
        self.length_type
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn encode_len(&self, len: u64) -> Vec<u8> {
        let width = self.length_type.size();
        match self.endianness {
            Endianness::Big => len.to_be_bytes()[8 - width..].to_vec(),
            Endianness::Little => len.to_le_bytes()[..width].to_vec(),
        }
    }

    /// Decode a prefix. `prefix` must be exactly `length_type.size()` bytes.
    fn decode_len(&self, prefix: &[u8]) -> u64 {
        let width = self.length_type.size();
        let mut raw = [0u8; 8];
        match self.endianness {
            Endianness::Big => {
                raw[8 - width..].copy_from_slice(prefix);
                u64::from_be_bytes(raw)
            }
            Endianness::Little => {
                raw[..width].copy_from_slice(prefix);
                u64::from_le_bytes(raw)
            }
        }
    }
}

impl Default for LengthPrefixedFramer {
    fn default() -> Self {
        Self::new(LengthType::default(), Endianness::default())
    }
}

impl std::fmt::Debug for LengthPrefixedFramer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LengthPrefixedFramer")
            .field("length_type", &self.length_type)
            .field("endianness", &self.endianness)
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl MessageFramer for LengthPrefixedFramer {
    fn frame(&self, payload: &[u8]) -> anyhow::Result<Bytes> {
        let len = payload.len() as u64;
        if len > self.length_type.max_len() {
            bail!(
                "payload of {} bytes exceeds {:?} length prefix (max {})",
                len,
                self.length_type,
                self.length_type.max_len()
            );
        }

        let mut out = BytesMut::with_capacity(self.length_type.size() + payload.len());
        out.extend_from_slice(&self.encode_len(len));
        out.extend_from_slice(payload);
        Ok(out.freeze())
    }

    fn unframe(&self, data: &[u8]) -> Vec<Bytes> {
        let prefix_len = self.length_type.size();
        let mut state = self.state.lock();
        state.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        loop {
            let expected = match state.expected {
                Some(expected) => expected,
                None => {
                    if state.buffer.len() < prefix_len {
                        break;
                    }
                    let declared = self.decode_len(&state.buffer[..prefix_len]);
                    state.buffer.advance(prefix_len);
                    // Unrepresentable lengths can never complete; they stay buffered.
                    let expected = usize::try_from(declared).unwrap_or(usize::MAX);
                    state.expected = Some(expected);
                    expected
                }
            };

            if state.buffer.len() < expected {
                break;
            }
            messages.push(state.buffer.split_to(expected).freeze());
            state.expected = None;
        }
        messages
    }

    fn is_complete(&self, data: &[u8]) -> bool {
        let prefix_len = self.length_type.size();
        if data.len() < prefix_len {
            return false;
        }
        let declared = self.decode_len(&data[..prefix_len]);
        ((data.len() - prefix_len) as u64) >= declared
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.buffer.clear();
        state.expected = None;
    }

    fn pending_len(&self) -> usize {
        let state = self.state.lock();
        let header = if state.expected.is_some() {
            self.length_type.size()
        } else {
            0
        };
        state.buffer.len() + header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_TYPES: [LengthType; 4] = [
        LengthType::U8,
        LengthType::U16,
        LengthType::U32,
        LengthType::U64,
    ];

    #[test]
    fn test_frame_layout() {
        let framer = LengthPrefixedFramer::new(LengthType::U32, Endianness::Big);
        assert_eq!(&framer.frame(b"hi").unwrap()[..], b"\x00\x00\x00\x02hi");

        let framer = LengthPrefixedFramer::new(LengthType::U16, Endianness::Little);
        let payload = vec![7u8; 0x0102];
        let framed = framer.frame(&payload).unwrap();
        assert_eq!(&framed[..2], &[0x02, 0x01]);
        assert_eq!(framed.len(), 2 + 0x0102);
    }

    #[test]
    fn test_frame_rejects_oversized_payload() {
        let framer = LengthPrefixedFramer::new(LengthType::U8, Endianness::Big);
        assert!(framer.frame(&[0u8; 255]).is_ok());
        let err = framer.frame(&[0u8; 256]).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_frame_then_unframe_every_width_and_order() {
        for length_type in ALL_TYPES {
            for endianness in [Endianness::Big, Endianness::Little] {
                let framer = LengthPrefixedFramer::new(length_type, endianness);
                let framed = framer.frame(b"payload").unwrap();
                assert_eq!(
                    framer.unframe(&framed),
                    vec![&b"payload"[..]],
                    "{length_type:?}/{endianness:?}"
                );
                assert_eq!(framer.pending_len(), 0);
            }
        }
    }

    #[test]
    fn test_waits_for_prefix_then_payload() {
        let framer = LengthPrefixedFramer::default();
        assert!(framer.unframe(&[0, 0]).is_empty());
        assert!(framer.unframe(&[0, 5, b'h', b'e']).is_empty());
        assert_eq!(framer.pending_len(), 6);
        assert_eq!(framer.unframe(b"llo\x00\x00"), vec![&b"hello"[..]]);
        assert_eq!(framer.pending_len(), 2);
    }

    #[test]
    fn test_multiple_messages_in_one_chunk() {
        let framer = LengthPrefixedFramer::new(LengthType::U8, Endianness::Big);
        let out = framer.unframe(b"\x01a\x00\x02bc\x03d");
        assert_eq!(out, vec![&b"a"[..], &b""[..], &b"bc"[..]]);
        assert_eq!(framer.pending_len(), 2);
    }

    #[test]
    fn test_is_complete_ignores_internal_state() {
        let framer = LengthPrefixedFramer::new(LengthType::U16, Endianness::Big);
        framer.unframe(b"\x00\x09partial");
        assert!(framer.is_complete(b"\x00\x01x"));
        assert!(!framer.is_complete(b"\x00\x02x"));
        assert!(!framer.is_complete(b"\x00"));
    }

    #[test]
    fn test_reset_discards_partial_message() {
        let framer = LengthPrefixedFramer::new(LengthType::U8, Endianness::Big);
        framer.unframe(b"\x05ab");
        framer.reset();
        assert_eq!(framer.unframe(b"\x01z"), vec![&b"z"[..]]);
    }
}
