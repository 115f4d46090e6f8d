use std::time::Duration;

use crate::traits::Channel;

/// Classify whether the remote side of `channel` is gone.
///
/// A channel that reports readable while zero bytes are buffered can only
/// be at end-of-stream: that combination is how the OS surfaces a peer
/// close. A probe that itself fails means the descriptor is no longer
/// usable, which counts as disconnected as well. Every other outcome is
/// presumed alive, including transient states the next probe will settle.
///
/// Never blocks (the poll uses a zero timeout) and never consumes buffered
/// data, so it is safe to call between read attempts at any frequency.
pub fn is_disconnected<C: Channel>(channel: &C) -> bool {
    if !channel.is_open() {
        return true;
    }
    match channel.poll_readable(Duration::ZERO) {
        Ok(true) => match channel.available() {
            Ok(0) => true,
            Ok(_) => false,
            Err(_) => true,
        },
        Ok(false) => false,
        Err(_) => true,
    }
}
