//! Frame codec configuration.
//!
//! Every message travels as one length-prefixed binary frame: a 4-byte
//! big-endian length followed by the encoded [`Envelope`](crate::Envelope).
//! Both sides construct their codec here so the limits always agree.

use tokio_util::codec::LengthDelimitedCodec;

/// Maximum frame length (16 MiB). Oversized frames are a fatal session
/// error — the codec rejects them before any allocation.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Builds the length-delimited codec used on both sides of the channel.
#[must_use]
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}
