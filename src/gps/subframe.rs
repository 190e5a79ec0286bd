//! Field extraction from parity-stripped GPS L1 C/A subframes.
//!
//! A subframe here is ten 24-bit words packed into 30 bytes. Bit
//! positions and scale factors are per IS-GPS-200 sections 20.3.3.3
//! (ephemeris) and 20.3.3.5 (almanac, ionosphere, UTC).

use tracing::trace;

use super::{getbits, getbitu, Sat};
use crate::nav::{Almanac, Ephemeris, IonParams, PageData, UtcParams};

/// Semicircles to radians.
pub const SC2RAD: f64 = 3.141_592_653_589_8;

const P2_5: f64 = 0.03125;
const P2_11: f64 = 4.882_812_5e-4;
const P2_19: f64 = 1.907_348_632_812_5e-6;
const P2_20: f64 = 9.536_743_164_062_5e-7;
const P2_21: f64 = 4.768_371_582_031_25e-7;
const P2_23: f64 = 1.192_092_895_507_812_5e-7;
const P2_24: f64 = 5.960_464_477_539_062_5e-8;
const P2_27: f64 = 7.450_580_596_923_828e-9;
const P2_29: f64 = 1.862_645_149_230_957e-9;
const P2_30: f64 = 9.313_225_746_154_785e-10;
const P2_31: f64 = 4.656_612_873_077_393e-10;
const P2_33: f64 = 1.164_153_218_269_348e-10;
const P2_38: f64 = 3.637_978_807_091_713e-12;
const P2_43: f64 = 1.136_868_377_216_16e-13;
const P2_50: f64 = 8.881_784_197_001_252e-16;
const P2_55: f64 = 2.775_557_561_562_891e-17;

/// Subframe id from the handover word, bits 43..46.
#[must_use]
pub fn subframe_id(subframe: &[u8]) -> u8 {
    getbitu(subframe, 43, 3) as u8
}

/// Decode subframes 1..=3 into an ephemeris.
///
/// `subframes` holds the three packed subframes concatenated in id
/// order (90 bytes). Returns `None` when any of the three does not
/// carry its expected id, which covers both never-received slots and
/// pages from different broadcast cycles.
#[must_use]
pub fn decode_ephemeris(sat: Sat, subframes: &[u8]) -> Option<Ephemeris> {
    if subframes.len() < 90 {
        return None;
    }
    let sf1 = &subframes[..30];
    let sf2 = &subframes[30..60];
    let sf3 = &subframes[60..90];
    for (sf, want) in [(sf1, 1), (sf2, 2), (sf3, 3)] {
        let id = subframe_id(sf);
        if id != want {
            trace!(sat = %sat, id, want, "subframe set incomplete");
            return None;
        }
    }

    // subframe 1: clock and health
    let tow = f64::from(getbitu(sf1, 24, 17)) * 6.0;
    let week = getbitu(sf1, 48, 10) as u16;
    let code_on_l2 = getbitu(sf1, 58, 2) as u8;
    let sv_accuracy = getbitu(sf1, 60, 4) as u8;
    let sv_health = getbitu(sf1, 64, 6) as u8;
    let iodc_hi = getbitu(sf1, 70, 2) as u16;
    let l2_p_data = getbitu(sf1, 72, 1) == 1;
    let tgd = f64::from(getbits(sf1, 160, 8)) * P2_31;
    let iodc_lo = getbitu(sf1, 168, 8) as u16;
    let toc = f64::from(getbitu(sf1, 176, 16)) * 16.0;
    let af2 = f64::from(getbits(sf1, 192, 8)) * P2_55;
    let af1 = f64::from(getbits(sf1, 200, 16)) * P2_43;
    let af0 = f64::from(getbits(sf1, 216, 22)) * P2_31;

    // subframe 2: orbit, first half
    let iode = getbitu(sf2, 48, 8) as u8;
    let crs = f64::from(getbits(sf2, 56, 16)) * P2_5;
    let delta_n = f64::from(getbits(sf2, 72, 16)) * P2_43 * SC2RAD;
    let m0 = f64::from(getbits(sf2, 88, 32)) * P2_31 * SC2RAD;
    let cuc = f64::from(getbits(sf2, 120, 16)) * P2_29;
    let e = f64::from(getbitu(sf2, 136, 32)) * P2_33;
    let cus = f64::from(getbits(sf2, 168, 16)) * P2_29;
    let sqrt_a = f64::from(getbitu(sf2, 184, 32)) * P2_19;
    let toe = f64::from(getbitu(sf2, 216, 16)) * 16.0;
    let fit_long = getbitu(sf2, 232, 1) == 1;

    // subframe 3: orbit, second half
    let cic = f64::from(getbits(sf3, 48, 16)) * P2_29;
    let omega0 = f64::from(getbits(sf3, 64, 32)) * P2_31 * SC2RAD;
    let cis = f64::from(getbits(sf3, 96, 16)) * P2_29;
    let i0 = f64::from(getbits(sf3, 112, 32)) * P2_31 * SC2RAD;
    let crc = f64::from(getbits(sf3, 144, 16)) * P2_5;
    let omega = f64::from(getbits(sf3, 160, 32)) * P2_31 * SC2RAD;
    let omega_dot = f64::from(getbits(sf3, 192, 24)) * P2_43 * SC2RAD;
    let idot = f64::from(getbits(sf3, 224, 14)) * P2_43 * SC2RAD;

    Some(Ephemeris {
        sat,
        iode,
        iodc: (iodc_hi << 8) | iodc_lo,
        week,
        tow,
        sv_accuracy,
        sv_health,
        code_on_l2,
        l2_p_data,
        toe,
        toc,
        a: sqrt_a * sqrt_a,
        e,
        i0,
        omega0,
        omega,
        m0,
        delta_n,
        omega_dot,
        idot,
        crc,
        crs,
        cuc,
        cus,
        cic,
        cis,
        tgd,
        af0,
        af1,
        af2,
        fit_long,
    })
}

/// Decode one subframe 4 or 5 page.
///
/// Pages with SV id 1..=32 carry an almanac entry for that satellite;
/// subframe 4 page 18 (SV id 56) carries the ionosphere and UTC
/// parameters. Other pages hold nothing this decoder consumes.
#[must_use]
pub fn decode_page(subframe: &[u8]) -> Option<PageData> {
    if subframe.len() < 30 {
        return None;
    }
    let id = subframe_id(subframe);
    if id != 4 && id != 5 {
        return None;
    }
    let sv_id = getbitu(subframe, 50, 6) as u8;
    match sv_id {
        1..=32 => decode_almanac(subframe, sv_id).map(PageData::Almanac),
        56 if id == 4 => Some(decode_ion_utc(subframe)),
        _ => None,
    }
}

fn decode_almanac(s: &[u8], sv_id: u8) -> Option<Almanac> {
    let sat = Sat::from_gps_prn(sv_id)?;
    let e = f64::from(getbitu(s, 56, 16)) * P2_21;
    let toa = f64::from(getbitu(s, 72, 8)) * 4096.0;
    let delta_i = f64::from(getbits(s, 80, 16)) * P2_19 * SC2RAD;
    let omega_dot = f64::from(getbits(s, 96, 16)) * P2_38 * SC2RAD;
    let sv_health = getbitu(s, 112, 8) as u8;
    let sqrt_a = f64::from(getbitu(s, 120, 24)) * P2_11;
    let omega0 = f64::from(getbits(s, 144, 24)) * P2_23 * SC2RAD;
    let omega = f64::from(getbits(s, 168, 24)) * P2_23 * SC2RAD;
    let m0 = f64::from(getbits(s, 192, 24)) * P2_23 * SC2RAD;
    // af0 is split: 8 msb, then af1, then 3 lsb
    let af0_raw = ((getbitu(s, 216, 8) << 3) | getbitu(s, 235, 3)) as i32;
    let af0_raw = if af0_raw & 0x400 != 0 {
        af0_raw - 0x800
    } else {
        af0_raw
    };
    let af1 = f64::from(getbits(s, 224, 11)) * P2_38;

    Some(Almanac {
        sat,
        sv_health,
        toa,
        e,
        delta_i,
        omega_dot,
        a: sqrt_a * sqrt_a,
        omega0,
        omega,
        m0,
        af0: f64::from(af0_raw) * P2_20,
        af1,
    })
}

fn decode_ion_utc(s: &[u8]) -> PageData {
    let alpha = [
        f64::from(getbits(s, 56, 8)) * P2_30,
        f64::from(getbits(s, 64, 8)) * P2_27,
        f64::from(getbits(s, 72, 8)) * P2_24,
        f64::from(getbits(s, 80, 8)) * P2_24,
    ];
    let beta = [
        f64::from(getbits(s, 88, 8)) * 2048.0,
        f64::from(getbits(s, 96, 8)) * 16384.0,
        f64::from(getbits(s, 104, 8)) * 65536.0,
        f64::from(getbits(s, 112, 8)) * 65536.0,
    ];
    let a1 = f64::from(getbits(s, 120, 24)) * P2_50;
    let a0 = f64::from(getbits(s, 144, 32)) * P2_30;
    let tot = f64::from(getbitu(s, 176, 8)) * 4096.0;
    let week = getbitu(s, 184, 8) as u16;
    let leap_seconds = getbits(s, 192, 8) as i8;

    PageData::IonUtc {
        ion: IonParams { alpha, beta },
        utc: UtcParams { a0, a1, tot, week },
        leap_seconds,
    }
}
