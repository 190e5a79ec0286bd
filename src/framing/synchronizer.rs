use std::io::{ErrorKind, Read};

use tracing::trace;

use super::{FRAME_OVERHEAD, MAX_FRAME_LEN, SYNC};
use crate::fields::read_u16;
use crate::{Error, Result};

/// Bytes examined per [`acquire`] call before giving up on finding a
/// start sync code.
pub const MAX_SYNC_SEARCH: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Sliding a 2-byte window over the input looking for [`SYNC`].
    Searching,
    /// Sync found; collecting the 2-byte length field.
    Length,
    /// Length known; filling the frame buffer.
    Accumulating { total: usize },
}

/// Byte-at-a-time frame accumulator.
///
/// Feed single bytes with [`push`](Self::push); a complete frame
/// (sync through end marker) is returned once buffered. The accumulator
/// performs no content validation beyond the length cap; completed
/// frames still carry their checksum and end marker for
/// [`Frame::parse`](super::Frame::parse).
///
/// Any failure resets the accumulator to searching, so a corrupt frame
/// never poisons the bytes that follow it.
#[derive(Debug)]
pub struct FrameAccumulator {
    state: State,
    window: [u8; 2],
    buf: Vec<u8>,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    #[must_use]
    pub fn new() -> Self {
        FrameAccumulator {
            state: State::Searching,
            window: [0; 2],
            buf: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Accept one input byte, returning a complete frame if this byte
    /// finished one.
    ///
    /// # Errors
    /// [`Error::FrameTooLong`] if the declared length exceeds
    /// [`MAX_FRAME_LEN`]. The frame is discarded and the accumulator
    /// resumes searching with the next byte.
    pub fn push(&mut self, byte: u8) -> Result<Option<Vec<u8>>> {
        match self.state {
            State::Searching => {
                self.window = [self.window[1], byte];
                if self.window == SYNC {
                    self.buf.clear();
                    self.buf.extend_from_slice(&SYNC);
                    self.state = State::Length;
                }
                Ok(None)
            }
            State::Length => {
                self.buf.push(byte);
                if self.buf.len() < 4 {
                    return Ok(None);
                }
                let total = usize::from(read_u16(&self.buf, 2)) + FRAME_OVERHEAD;
                if total > MAX_FRAME_LEN {
                    self.reset();
                    return Err(Error::FrameTooLong { len: total });
                }
                self.state = State::Accumulating { total };
                Ok(None)
            }
            State::Accumulating { total } => {
                self.buf.push(byte);
                if self.buf.len() < total {
                    return Ok(None);
                }
                self.reset();
                Ok(Some(std::mem::take(&mut self.buf)))
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::Searching;
        self.window = [0; 2];
    }
}

/// Outcome of one bounded bulk acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// A complete frame was read.
    Frame(Vec<u8>),
    /// No start sync within [`MAX_SYNC_SEARCH`] bytes; call again to
    /// keep searching.
    NoSync,
    /// The source reached end of input.
    Eof,
}

/// Pull bytes from `reader` until one complete frame is buffered.
///
/// The search for the start sync is bounded by [`MAX_SYNC_SEARCH`]
/// bytes per call so a sync-less source cannot capture the caller
/// forever. `window` is the caller's 2-byte search window and must
/// persist between calls on the same stream: a start sync code split
/// across the search boundary is picked up by the next call. Once sync
/// is found the declared length is read and the remainder of the frame
/// is read in one shot.
///
/// # Errors
/// [`Error::FrameTooLong`] for an oversized declared length (nothing
/// beyond the length field is consumed for such frames), or
/// [`Error::Io`] from the underlying reader.
pub fn acquire<R: Read>(reader: &mut R, window: &mut [u8; 2]) -> Result<Acquisition> {
    for _ in 0..MAX_SYNC_SEARCH {
        let Some(byte) = read_byte(reader)? else {
            return Ok(Acquisition::Eof);
        };
        *window = [window[1], byte];
        if *window != SYNC {
            continue;
        }
        *window = [0; 2];

        let mut head = [0u8; 2];
        if !fill(reader, &mut head)? {
            return Ok(Acquisition::Eof);
        }
        let total = usize::from(u16::from_be_bytes(head)) + FRAME_OVERHEAD;
        if total > MAX_FRAME_LEN {
            return Err(Error::FrameTooLong { len: total });
        }

        let mut frame = vec![0u8; total];
        frame[..2].copy_from_slice(&SYNC);
        frame[2..4].copy_from_slice(&head);
        if !fill(reader, &mut frame[4..])? {
            return Ok(Acquisition::Eof);
        }
        return Ok(Acquisition::Frame(frame));
    }
    trace!("no sync in {MAX_SYNC_SEARCH} bytes");
    Ok(Acquisition::NoSync)
}

fn read_byte<R: Read>(reader: &mut R) -> Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(Error::Io(err)),
        }
    }
}

fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(Error::Io(err)),
    }
}
