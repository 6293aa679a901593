//! Low-level building blocks for TCP networking.
//!
//! This crate provides the pieces the connection engine is assembled from.
//! None of them start threads of their own.
//!
//! # Modules
//!
//! - [`socket`] - Owned socket handle, option application, close-to-unblock
//! - [`ring_buffer`] - Fixed-capacity circular byte buffer
//! - [`framing`] - Length-prefixed and delimiter message framing
//! - [`rate_limiter`] - Token-bucket rate limiting
//! - [`addr`] - IPv4 resolution and endpoint parsing helpers
//!
//! # Examples
//!
//! ```
//! use tcpnet_proto::{Framer, MessageFramer, LengthType, Endianness};
//!
//! # fn example() -> anyhow::Result<()> {
//! let framer = Framer::length_prefixed(LengthType::U32, Endianness::Big);
//! let wire = framer.frame(b"hello")?;
//! assert_eq!(framer.unframe(&wire), vec![&b"hello"[..]]);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod addr;
pub mod framing;
pub mod rate_limiter;
pub mod ring_buffer;
pub mod socket;

// Re-export commonly used types
pub use framing::{
    DelimiterFramer, Endianness, Framer, FramingConfig, LengthPrefixedFramer, LengthType,
    MessageFramer,
};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use ring_buffer::RingBuffer;
pub use socket::{RawHandle, Socket};
