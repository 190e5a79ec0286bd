//! Fixed-offset field extraction for SiRF payloads.
//!
//! All multi-byte fields on the wire are big-endian regardless of host
//! order. Doubles have two layouts; see [`DoubleLayout`].

/// Bit layout used for 8-byte floating point fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DoubleLayout {
    /// One big-endian IEEE 754 double.
    #[default]
    Standard,
    /// GSW 2.3-era firmware emits doubles as two independently
    /// byte-swapped 32-bit halves, low-mantissa half first.
    Split,
}

pub fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

pub fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub fn read_f32(buf: &[u8], off: usize) -> f32 {
    f32::from_bits(read_u32(buf, off))
}

pub fn read_f64(buf: &[u8], off: usize, layout: DoubleLayout) -> f64 {
    let (hi, lo) = match layout {
        DoubleLayout::Standard => (read_u32(buf, off), read_u32(buf, off + 4)),
        DoubleLayout::Split => (read_u32(buf, off + 4), read_u32(buf, off)),
    };
    f64::from_bits((u64::from(hi) << 32) | u64::from(lo))
}
