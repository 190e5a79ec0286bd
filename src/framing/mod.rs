//! SiRF binary framing.
//!
//! Every message travels in a frame:
//!
//! ```text
//! [sync(2)][length(2)][message id(1)][payload][checksum(2)][end sync(2)]
//! ```
//!
//! The length field counts the bytes between the length field and the
//! checksum (message id included), so the total frame size is the length
//! field plus [`FRAME_OVERHEAD`].

mod synchronizer;

pub use synchronizer::{acquire, Acquisition, FrameAccumulator, MAX_SYNC_SEARCH};

use crate::fields::read_u16;
use crate::{Error, Result};

/// Frame start sync code.
pub const SYNC: [u8; 2] = [0xa0, 0xa2];
/// Frame end sync code.
pub const END: [u8; 2] = [0xb0, 0xb3];
/// Maximum total frame length in bytes.
pub const MAX_FRAME_LEN: usize = 2047;
/// Framing bytes surrounding the payload: sync, length, checksum, end sync.
pub const FRAME_OVERHEAD: usize = 8;

/// 15-bit additive checksum over the payload bytes.
#[must_use]
pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |sum, &b| (sum + u16::from(b)) & 0x7fff)
}

/// A structurally validated frame.
///
/// [`Frame::parse`] validates the sync codes, declared length, and
/// checksum once; accessors afterwards cannot go out of bounds.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Validate `data` as one complete frame.
    ///
    /// # Errors
    /// [`Error::Sync`], [`Error::Length`], [`Error::EndMarker`], or
    /// [`Error::Checksum`] describing the first structural check that
    /// failed. A failed frame is simply dropped by callers; no decoder
    /// state is affected.
    pub fn parse(data: &'a [u8]) -> Result<Frame<'a>> {
        if data.len() < FRAME_OVERHEAD + 1 || data[..2] != SYNC {
            let mut found = [0u8; 2];
            found.copy_from_slice(data.get(..2).unwrap_or(&[0, 0]));
            return Err(Error::Sync { found });
        }
        let declared = usize::from(read_u16(data, 2)) + FRAME_OVERHEAD;
        if declared > MAX_FRAME_LEN {
            return Err(Error::FrameTooLong { len: declared });
        }
        if declared != data.len() {
            return Err(Error::Length {
                declared,
                actual: data.len(),
            });
        }
        if data[data.len() - 2..] != END {
            return Err(Error::EndMarker {
                found: [data[data.len() - 2], data[data.len() - 1]],
            });
        }
        let payload = &data[4..data.len() - 4];
        let computed = checksum(payload);
        let stored = read_u16(data, data.len() - 4);
        if computed != stored {
            return Err(Error::Checksum { computed, stored });
        }
        Ok(Frame { data })
    }

    /// First payload byte, identifying the message type.
    #[must_use]
    pub fn message_id(&self) -> u8 {
        self.data[4]
    }

    /// Payload bytes, message id included.
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        &self.data[4..self.data.len() - 4]
    }

    /// Total frame length, overhead included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn build_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    frame.extend_from_slice(&SYNC);
    frame.extend_from_slice(&u16::try_from(payload.len()).unwrap().to_be_bytes());
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&checksum(payload).to_be_bytes());
    frame.extend_from_slice(&END);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_masked_to_15_bits() {
        let payload = vec![0xffu8; 200];
        assert_eq!(checksum(&payload), (200 * 0xff) & 0x7fff);
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x07, 0x01]), 8);
    }

    #[test]
    fn parse_valid_frame() {
        let data = build_frame(&[0x07, 0xaa, 0xbb]);
        let frame = Frame::parse(&data).unwrap();
        assert_eq!(frame.message_id(), 0x07);
        assert_eq!(frame.payload(), &[0x07, 0xaa, 0xbb]);
        assert_eq!(frame.len(), 11);
    }

    #[test]
    fn parse_captured_frame() {
        // ack (mid 11) for a poll, captured from a SiRFstarIV
        let data = hex::decode("a0a200020b84008fb0b3").unwrap();
        let frame = Frame::parse(&data).unwrap();
        assert_eq!(frame.message_id(), 0x0b);
        assert_eq!(frame.payload(), &[0x0b, 0x84]);
    }

    #[test]
    fn parse_rejects_bad_end_marker() {
        let mut data = build_frame(&[0x07, 0xaa]);
        let n = data.len();
        data[n - 1] = 0x00;
        assert!(matches!(
            Frame::parse(&data),
            Err(Error::EndMarker { found: [0xb0, 0x00] })
        ));
    }

    #[test]
    fn parse_rejects_corrupt_payload() {
        let mut data = build_frame(&[0x07, 0xaa, 0xbb, 0xcc]);
        data[5] ^= 0x10;
        assert!(matches!(Frame::parse(&data), Err(Error::Checksum { .. })));
    }

    #[test]
    fn any_single_byte_mutation_breaks_checksum() {
        let data = build_frame(&[0x1c, 1, 2, 3, 4, 5]);
        for i in 4..data.len() - 4 {
            for bit in 0..8 {
                let mut bad = data.clone();
                bad[i] ^= 1 << bit;
                assert!(
                    matches!(Frame::parse(&bad), Err(Error::Checksum { .. })),
                    "payload byte {i} bit {bit}"
                );
            }
        }
    }
}
