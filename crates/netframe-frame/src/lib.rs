//! Length-prefixed message framing over byte channels.
//!
//! Every message travels as a 4-byte big-endian payload length followed by
//! the payload bytes, nothing else. On the read side, frames are assembled
//! incrementally with non-blocking, all-or-nothing polls: a call either
//! consumes a complete header or payload or consumes nothing at all. On
//! the write side, each connection gets a dedicated send pipeline that
//! coalesces everything queued into a single contiguous write.
//!
//! The channel underneath must be an ordered, reliable byte stream (see
//! `netframe-channel`); the framing layer adds message boundaries, not
//! integrity checking.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, decode_len, encode_batch, encode_frame, encode_len, LEN_PREFIX_SIZE, MAX_PAYLOAD,
};
pub use error::{FrameError, Result};
pub use reader::{try_read_header, try_read_payload, FrameReader};
pub use writer::{FrameSender, SendPipeline};
