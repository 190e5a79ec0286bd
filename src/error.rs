use crate::framing::MAX_FRAME_LEN;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Frame does not begin with the start sync code.
    #[error("bad start sync {found:02x?}")]
    Sync { found: [u8; 2] },
    /// Declared frame length exceeds the protocol maximum.
    #[error("frame length {len} exceeds maximum {MAX_FRAME_LEN}")]
    FrameTooLong { len: usize },
    /// Buffered frame does not match its declared length.
    #[error("declared frame length {declared}, have {actual} bytes")]
    Length { declared: usize, actual: usize },
    /// Frame does not terminate with the end sync code.
    #[error("bad end sync {found:02x?}")]
    EndMarker { found: [u8; 2] },
    #[error("checksum mismatch: computed {computed:#06x}, stored {stored:#06x}")]
    Checksum { computed: u16, stored: u16 },

    /// Message payload length does not match the fixed size for its id.
    #[error("message {mid:#04x} has invalid length {len}")]
    MessageLength { mid: u8, len: usize },
    #[error("channel index {channel} out of range")]
    Channel { channel: u8 },
    #[error("no satellite for GPS prn {prn}")]
    UnknownPrn { prn: u8 },
}

pub type Result<T> = std::result::Result<T, Error>;
