//! Message framing over a byte stream.
//!
//! TCP delivers bytes, not messages. A framer turns outgoing payloads into
//! self-delimited units with [`MessageFramer::frame`] and reassembles
//! incoming chunks into whole messages with [`MessageFramer::unframe`],
//! carrying any partial tail over to the next call.
//!
//! Two framings are supported, grouped under the closed [`Framer`] enum:
//!
//! - [`LengthPrefixedFramer`] - fixed-width integer length, then payload
//! - [`DelimiterFramer`] - payload terminated by a byte sequence
//!
//! Framers keep their carry-over behind an internal lock, so one framer can
//! live inside a `Fn` data handler shared with the receive loop.
//!
//! # Examples
//!
//! ```
//! use tcpnet_proto::framing::{Framer, MessageFramer};
//!
//! let framer = Framer::delimiter(b"\r\n".to_vec());
//! assert_eq!(framer.unframe(b"a\r\nb"), vec![&b"a"[..]]);
//! assert_eq!(framer.unframe(b"\r\n"), vec![&b"b"[..]]);
//! ```

mod delimiter;
mod length_prefixed;
mod proptest_framing;

pub use delimiter::DelimiterFramer;
pub use length_prefixed::{Endianness, LengthPrefixedFramer, LengthType};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Common contract of every framing variant.
pub trait MessageFramer {
    /// Wrap one payload into a self-delimited unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented by this framing,
    /// such as a length that overflows the prefix width.
    fn frame(&self, payload: &[u8]) -> anyhow::Result<Bytes>;

    /// Append `data` to the carry-over buffer and extract every complete message.
    fn unframe(&self, data: &[u8]) -> Vec<Bytes>;

    /// Whether `data` on its own holds at least one complete message.
    fn is_complete(&self, data: &[u8]) -> bool;

    /// Discard carry-over state, e.g. after a reconnect.
    fn reset(&self);

    /// Bytes currently buffered waiting for the rest of a message.
    fn pending_len(&self) -> usize;
}

/// The closed set of framing variants.
#[derive(Debug)]
pub enum Framer {
    LengthPrefixed(LengthPrefixedFramer),
    Delimiter(DelimiterFramer),
}

impl Framer {
    /// Length-prefixed framing with the given width and byte order.
    pub fn length_prefixed(length_type: LengthType, endianness: Endianness) -> Self {
        Self::LengthPrefixed(LengthPrefixedFramer::new(length_type, endianness))
    }

    /// Delimiter framing that strips the delimiter from emitted messages.
    pub fn delimiter(delimiter: impl Into<Vec<u8>>) -> Self {
        Self::Delimiter(DelimiterFramer::new(delimiter))
    }

    /// Build a framer from its configuration.
    pub fn from_config(config: &FramingConfig) -> Self {
        match config {
            FramingConfig::LengthPrefixed {
                length_type,
                endianness,
            } => Self::length_prefixed(*length_type, *endianness),
            FramingConfig::Delimiter {
                delimiter,
                include_delimiter,
            } => Self::Delimiter(
                DelimiterFramer::new(delimiter.as_bytes().to_vec())
                    .with_include_delimiter(*include_delimiter),
            ),
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::LengthPrefixed(LengthPrefixedFramer::default())
    }
}

impl MessageFramer for Framer {
    fn frame(&self, payload: &[u8]) -> anyhow::Result<Bytes> {
        match self {
            Self::LengthPrefixed(f) => f.frame(payload),
            Self::Delimiter(f) => f.frame(payload),
        }
    }

    fn unframe(&self, data: &[u8]) -> Vec<Bytes> {
        match self {
            Self::LengthPrefixed(f) => f.unframe(data),
            Self::Delimiter(f) => f.unframe(data),
        }
    }

    fn is_complete(&self, data: &[u8]) -> bool {
        match self {
            Self::LengthPrefixed(f) => f.is_complete(data),
            Self::Delimiter(f) => f.is_complete(data),
        }
    }

    fn reset(&self) {
        match self {
            Self::LengthPrefixed(f) => f.reset(),
            Self::Delimiter(f) => f.reset(),
        }
    }

    fn pending_len(&self) -> usize {
        match self {
            Self::LengthPrefixed(f) => f.pending_len(),
            Self::Delimiter(f) => f.pending_len(),
        }
    }
}

/// Serializable description of a framer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FramingConfig {
    LengthPrefixed {
        #[serde(default)]
        length_type: LengthType,
        #[serde(default)]
        endianness: Endianness,
    },
    Delimiter {
        delimiter: String,
        #[serde(default)]
        include_delimiter: bool,
    },
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self::LengthPrefixed {
            length_type: LengthType::default(),
            endianness: Endianness::default(),
        }
    }
}
