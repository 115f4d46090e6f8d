use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Wire size of the length prefix preceding every payload.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Largest payload representable in the length prefix.
pub const MAX_PAYLOAD: usize = u32::MAX as usize;

/// Encode a payload length into its wire representation.
pub fn encode_len(len: u32) -> [u8; LEN_PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decode a wire length prefix.
pub fn decode_len(prefix: [u8; LEN_PREFIX_SIZE]) -> u32 {
    u32::from_be_bytes(prefix)
}

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// +--------------------+---------------------+
/// | Length (4 B, BE)   | Payload             |
/// | unsigned           | (Length bytes)      |
/// +--------------------+---------------------+
/// ```
///
/// There is no magic number, version byte, or checksum: the channel is an
/// ordered, reliable stream, and the consumer of netframe frames owns any
/// payload-level validation. A length of zero is a valid empty message.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    dst.reserve(LEN_PREFIX_SIZE + payload.len());
    dst.put_slice(&encode_len(payload.len() as u32));
    dst.put_slice(payload);
    Ok(())
}

/// Encode a batch of payloads into one contiguous buffer.
///
/// Frames are laid out back to back in iteration order; a receiver decodes
/// them as independent messages. This is how queued sends coalesce into a
/// single write.
pub fn encode_batch<I, B>(payloads: I, dst: &mut BytesMut) -> Result<()>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    for payload in payloads {
        encode_frame(payload.as_ref(), dst)?;
    }
    Ok(())
}

/// Decode the next frame from a buffer.
///
/// Returns `None` without touching the buffer when it does not yet hold a
/// complete frame. On success the frame's bytes are consumed and the
/// payload is returned.
pub fn decode_frame(src: &mut BytesMut) -> Option<Bytes> {
    if src.len() < LEN_PREFIX_SIZE {
        // Need more data for the prefix
        return None;
    }

    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LEN_PREFIX_SIZE]);
    let payload_len = decode_len(prefix) as usize;

    if src.len() < LEN_PREFIX_SIZE + payload_len {
        // Need more data for the payload
        return None;
    }

    src.advance(LEN_PREFIX_SIZE);
    Some(src.split_to(payload_len).freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello netframe", &mut buf).unwrap();

        let payload = decode_frame(&mut buf).expect("complete frame should decode");
        assert_eq!(payload.as_ref(), b"hello netframe");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf).unwrap();
        assert_eq!(buf.len(), LEN_PREFIX_SIZE);

        let payload = decode_frame(&mut buf).expect("empty frame should decode");
        assert!(payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_len_prefix_is_big_endian() {
        assert_eq!(encode_len(0x0102_0304), [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(decode_len([0x01, 0x02, 0x03, 0x04]), 0x0102_0304);
        assert_eq!(encode_len(2), [0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00][..]);
        assert!(decode_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"payload", &mut buf).unwrap();
        buf.truncate(LEN_PREFIX_SIZE + 3);

        assert!(decode_frame(&mut buf).is_none());
        assert_eq!(buf.len(), LEN_PREFIX_SIZE + 3);
    }

    #[test]
    fn test_multiple_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();
        encode_frame(b"third", &mut buf).unwrap();

        assert_eq!(decode_frame(&mut buf).unwrap().as_ref(), b"first");
        assert_eq!(decode_frame(&mut buf).unwrap().as_ref(), b"second");
        assert_eq!(decode_frame(&mut buf).unwrap().as_ref(), b"third");
        assert!(decode_frame(&mut buf).is_none());
    }

    #[test]
    fn test_batch_wire_layout() {
        let payloads: [&[u8]; 3] = [&[0x01, 0x02], &[], &[0x03]];
        let mut buf = BytesMut::new();
        encode_batch(payloads, &mut buf).unwrap();

        assert_eq!(
            buf.as_ref(),
            &[
                0x00, 0x00, 0x00, 0x02, 0x01, 0x02, // [0x01, 0x02]
                0x00, 0x00, 0x00, 0x00, // empty
                0x00, 0x00, 0x00, 0x01, 0x03, // [0x03]
            ]
        );
    }

    #[test]
    fn test_batch_equals_sequential_encodes() {
        let payloads = vec![b"alpha".to_vec(), b"".to_vec(), b"gamma".to_vec()];

        let mut batched = BytesMut::new();
        encode_batch(payloads.iter(), &mut batched).unwrap();

        let mut sequential = BytesMut::new();
        for payload in &payloads {
            encode_frame(payload, &mut sequential).unwrap();
        }

        assert_eq!(batched, sequential);

        for expected in &payloads {
            let payload = decode_frame(&mut batched).expect("batched frame should decode");
            assert_eq!(payload.as_ref(), expected.as_slice());
        }
        assert!(batched.is_empty());
    }
}
