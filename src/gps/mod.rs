//! GPS satellite identifiers, time, and L1 C/A navigation message
//! decoding.
//!
//! The protocol engine treats navigation-data semantics as a pluggable
//! collaborator; [`NavDecoder`] is the seam and [`GpsNavDecoder`] the
//! shipped implementation.

pub mod subframe;

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::nav::{Ephemeris, PageData};

/// Speed of light, m/s.
pub const CLIGHT: f64 = 299_792_458.0;
/// L1 carrier frequency, Hz.
pub const FREQ_L1: f64 = 1.575_42e9;
/// L1 carrier wavelength, m.
pub const LAMBDA_L1: f64 = CLIGHT / FREQ_L1;

/// Seconds in one GPS week.
pub const WEEK_SECONDS: f64 = 604_800.0;

/// Highest GPS PRN handled.
pub const MAX_GPS_PRN: u8 = 32;

/// A satellite identifier, currently GPS PRN 1..=32.
///
/// `Sat` is dense: [`Sat::index`] is suitable for direct array indexing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Sat(u8);

impl Sat {
    /// Map a GPS PRN to a satellite id, or `None` for a PRN outside
    /// 1..=32.
    #[must_use]
    pub fn from_gps_prn(prn: u8) -> Option<Self> {
        if (1..=MAX_GPS_PRN).contains(&prn) {
            Some(Sat(prn))
        } else {
            None
        }
    }

    #[must_use]
    pub fn prn(&self) -> u8 {
        self.0
    }

    /// Zero-based dense index.
    #[must_use]
    pub fn index(&self) -> usize {
        usize::from(self.0) - 1
    }
}

impl std::fmt::Display for Sat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "G{:02}", self.0)
    }
}

/// A GPS time: week number plus seconds into the week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsTime {
    pub week: u16,
    pub tow: f64,
}

impl GpsTime {
    #[must_use]
    pub fn new(week: u16, tow: f64) -> Self {
        GpsTime { week, tow }
    }

    /// Absolute time on the GPST scale.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        Epoch::from_gpst_seconds(f64::from(self.week) * WEEK_SECONDS + self.tow)
    }
}

/// Decodes 50 bps navigation data.
///
/// One implementation per constellation/signal; the decoder session
/// owns one as a boxed trait object.
pub trait NavDecoder: Send {
    /// Strip parity from one raw 30-bit word (two leading star bits
    /// plus 24 data and 6 parity bits), returning the data bits, or
    /// `None` on a parity failure.
    fn decode_word(&self, word: u32) -> Option<[u8; 3]>;

    /// Decode subframes 1..=3 (three packed 30-byte subframes,
    /// concatenated in id order) into an ephemeris for `sat`.
    fn decode_ephemeris(&self, sat: Sat, subframes: &[u8]) -> Option<Ephemeris>;

    /// Decode one packed subframe 4 or 5 page.
    fn decode_page(&self, subframe: &[u8]) -> Option<PageData>;
}

/// [`NavDecoder`] for the GPS L1 C/A signal per IS-GPS-200.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpsNavDecoder;

impl NavDecoder for GpsNavDecoder {
    fn decode_word(&self, word: u32) -> Option<[u8; 3]> {
        decode_word(word)
    }

    fn decode_ephemeris(&self, sat: Sat, subframes: &[u8]) -> Option<Ephemeris> {
        subframe::decode_ephemeris(sat, subframes)
    }

    fn decode_page(&self, subframe: &[u8]) -> Option<PageData> {
        subframe::decode_page(subframe)
    }
}

// Parity coverage masks for D25..D30, over a word laid out as
// [D29* D30* d1..d24 D25..D30].
const PARITY_MASKS: [u32; 6] = [
    0xbb1f_3480,
    0x5d8f_9a40,
    0xaec7_cd00,
    0x5e37_8d00,
    0x2f1b_1c00,
    0x3b7a_89c0,
];

/// Check parity of one navigation word and return the 24 data bits
/// packed into 3 bytes, or `None` on failure.
#[must_use]
pub fn decode_word(mut word: u32) -> Option<[u8; 3]> {
    // data bits are complemented when the previous word ended with D30=1
    if word & 0x4000_0000 != 0 {
        word ^= 0x3fff_ffc0;
    }
    let mut parity = 0u32;
    for mask in PARITY_MASKS {
        parity = (parity << 1) | (((word & mask) >> 6).count_ones() & 1);
    }
    if parity != word & 0x3f {
        return None;
    }
    Some([(word >> 22) as u8, (word >> 14) as u8, (word >> 6) as u8])
}

/// Build a transmittable navigation word from 24 data bits and the star
/// bits of the previous word. Inverse of [`decode_word`]; used to
/// synthesize navigation data for tests and receiver simulators.
#[must_use]
pub fn encode_word(data: u32, d29_star: bool, d30_star: bool) -> u32 {
    let plain = (u32::from(d29_star) << 31)
        | (u32::from(d30_star) << 30)
        | ((data & 0x00ff_ffff) << 6);
    let mut parity = 0u32;
    for mask in PARITY_MASKS {
        parity = (parity << 1) | (((plain & mask) >> 6).count_ones() & 1);
    }
    // the data bits travel complemented when D30*=1; parity does not
    let sent = if d30_star { plain ^ 0x3fff_ffc0 } else { plain };
    sent | parity
}

/// Extract `len` bits (msb first) starting at bit `pos` as an unsigned
/// value.
#[must_use]
pub fn getbitu(buf: &[u8], pos: usize, len: usize) -> u32 {
    let mut bits = 0u32;
    for i in pos..pos + len {
        bits = (bits << 1) | u32::from((buf[i / 8] >> (7 - i % 8)) & 1);
    }
    bits
}

/// Extract `len` bits starting at bit `pos`, sign-extended.
#[must_use]
pub fn getbits(buf: &[u8], pos: usize, len: usize) -> i32 {
    let bits = getbitu(buf, pos, len);
    if len == 0 || len >= 32 || bits & (1 << (len - 1)) == 0 {
        return bits as i32;
    }
    (bits | (u32::MAX << len)) as i32
}

/// Store `len` bits of `value` (msb first) starting at bit `pos`.
/// Companion of [`getbitu`] for building synthetic subframes.
pub fn setbitu(buf: &mut [u8], pos: usize, len: usize, value: u32) {
    for (k, i) in (pos..pos + len).enumerate() {
        let bit = (value >> (len - 1 - k)) & 1;
        let mask = 0x80 >> (i % 8);
        if bit == 1 {
            buf[i / 8] |= mask;
        } else {
            buf[i / 8] &= !mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, None; "prn zero")]
    #[test_case(1, Some(1); "first prn")]
    #[test_case(32, Some(32); "last prn")]
    #[test_case(33, None; "out of range")]
    fn sat_mapping(prn: u8, expected: Option<u8>) {
        assert_eq!(Sat::from_gps_prn(prn).map(|s| s.prn()), expected);
    }

    #[test]
    fn sat_index_is_dense() {
        let sat = Sat::from_gps_prn(7).unwrap();
        assert_eq!(sat.index(), 6);
        assert_eq!(sat.to_string(), "G07");
    }

    #[test]
    fn gps_time_epoch() {
        let t = GpsTime::new(0, 0.0);
        // GPS epoch origin
        assert_eq!(t.epoch().to_gpst_seconds(), 0.0);

        let t = GpsTime::new(2200, 345_600.0);
        assert_eq!(
            t.epoch().to_gpst_seconds(),
            2200.0 * WEEK_SECONDS + 345_600.0
        );
    }

    #[test]
    fn word_roundtrip() {
        for &data in &[0u32, 1, 0x00ab_cdef, 0x00ff_ffff, 0x0055_5555] {
            for &(d29, d30) in &[(false, false), (true, false), (false, true), (true, true)] {
                let word = encode_word(data, d29, d30);
                let bytes = decode_word(word).expect("parity should hold");
                let got =
                    (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2]);
                assert_eq!(got, data, "data {data:#08x} d29*={d29} d30*={d30}");
            }
        }
    }

    #[test]
    fn word_parity_failure() {
        let word = encode_word(0x00ab_cdef, false, false);
        for bit in 0..30 {
            assert!(
                decode_word(word ^ (1 << bit)).is_none(),
                "flipped bit {bit} should fail parity"
            );
        }
    }

    #[test]
    fn bit_extraction() {
        let buf = [0b1010_1100, 0b0011_0101];
        assert_eq!(getbitu(&buf, 0, 4), 0b1010);
        assert_eq!(getbitu(&buf, 4, 8), 0b1100_0011);
        assert_eq!(getbits(&buf, 0, 4), -6); // 0b1010 sign extended
        assert_eq!(getbits(&buf, 1, 3), 0b010);
    }

    #[test]
    fn set_then_get() {
        let mut buf = [0u8; 30];
        setbitu(&mut buf, 43, 3, 5);
        setbitu(&mut buf, 24, 17, 0x1_5555);
        assert_eq!(getbitu(&buf, 43, 3), 5);
        assert_eq!(getbitu(&buf, 24, 17), 0x1_5555);
        setbitu(&mut buf, 43, 3, 2);
        assert_eq!(getbitu(&buf, 43, 3), 2);
    }
}
