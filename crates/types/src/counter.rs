//! Fixed-width counter encoding.
//!
//! Counter values are unsigned 64-bit little-endian, always exactly eight
//! bytes on disk. The server never interprets values, so both sides of the
//! protocol must agree on this encoding; it lives here so the client and
//! tests share one implementation.

use snafu::Snafu;

/// Width in bytes of an encoded counter.
pub const COUNTER_WIDTH: usize = 8;

/// Error decoding a stored counter value.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CounterError {
    /// The stored value has the wrong width for a counter.
    #[snafu(display("counter value has invalid width {len}, expected {COUNTER_WIDTH}"))]
    InvalidWidth {
        /// Actual length of the stored value.
        len: usize,
    },
}

/// Encodes a counter as fixed-width little-endian bytes.
#[must_use]
pub fn encode(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Decodes a stored counter value.
///
/// An absent or empty value decodes to `0`, so counters need no explicit
/// initialization. Any other width is a format error.
pub fn decode(buf: Option<&[u8]>) -> Result<u64, CounterError> {
    match buf {
        None => Ok(0),
        Some([]) => Ok(0),
        Some(bytes) => {
            let arr: [u8; COUNTER_WIDTH] =
                bytes.try_into().map_err(|_| CounterError::InvalidWidth { len: bytes.len() })?;
            Ok(u64::from_le_bytes(arr))
        }
    }
}
