//! Navigation output produced by the decoder: observations, broadcast
//! ephemeris, almanac, and ionosphere/UTC parameters.

use serde::{Deserialize, Serialize};

use crate::gps::{GpsTime, Sat, MAX_GPS_PRN};

/// Number of satellite slots in the per-satellite stores.
pub const MAX_SATS: usize = MAX_GPS_PRN as usize;

/// Signal/code identifier for an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Code {
    /// L1 C/A.
    L1C,
}

/// One finalized, clock-corrected observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub sat: Sat,
    /// Signal reception time, clock bias removed.
    pub time: GpsTime,
    /// Pseudorange, m.
    pub pseudorange: f64,
    /// Accumulated carrier phase, cycles. Zero when not tracked.
    pub carrier_phase: f64,
    /// Doppler, Hz.
    pub doppler: f64,
    /// Carrier to noise ratio, 0.25 dB-Hz units.
    pub snr: f64,
    /// Set when carrier lock was lost or is suspect (cycle slip).
    pub lock_lost: bool,
    pub code: Code,
}

/// One synchronized, satellite-sorted set of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEpoch {
    /// Receiver epoch time.
    pub time: GpsTime,
    pub observations: Vec<Observation>,
}

/// GPS broadcast ephemeris, scaled to SI units and radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ephemeris {
    pub sat: Sat,
    /// Issue of data, ephemeris.
    pub iode: u8,
    /// Issue of data, clock.
    pub iodc: u16,
    /// Broadcast (mod-1024) week number.
    pub week: u16,
    /// Time of week of the transmitting subframe 1, s.
    pub tow: f64,
    pub sv_accuracy: u8,
    pub sv_health: u8,
    pub code_on_l2: u8,
    pub l2_p_data: bool,
    /// Reference time of ephemeris, seconds of week.
    pub toe: f64,
    /// Reference time of clock, seconds of week.
    pub toc: f64,
    /// Semi-major axis, m.
    pub a: f64,
    /// Eccentricity.
    pub e: f64,
    /// Inclination at reference time, rad.
    pub i0: f64,
    /// Longitude of ascending node at weekly epoch, rad.
    pub omega0: f64,
    /// Argument of perigee, rad.
    pub omega: f64,
    /// Mean anomaly at reference time, rad.
    pub m0: f64,
    /// Mean motion difference, rad/s.
    pub delta_n: f64,
    /// Rate of right ascension, rad/s.
    pub omega_dot: f64,
    /// Rate of inclination, rad/s.
    pub idot: f64,
    pub crc: f64,
    pub crs: f64,
    pub cuc: f64,
    pub cus: f64,
    pub cic: f64,
    pub cis: f64,
    /// Group delay, s.
    pub tgd: f64,
    /// Clock bias polynomial: af0 s, af1 s/s, af2 s/s².
    pub af0: f64,
    pub af1: f64,
    pub af2: f64,
    /// Fit interval flag: set for a fit interval greater than 4 hours.
    pub fit_long: bool,
}

/// GPS almanac entry for one satellite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Almanac {
    pub sat: Sat,
    pub sv_health: u8,
    /// Almanac reference time, seconds of week.
    pub toa: f64,
    pub e: f64,
    /// Inclination offset from 0.3 semicircles, rad.
    pub delta_i: f64,
    pub omega_dot: f64,
    /// Semi-major axis, m.
    pub a: f64,
    pub omega0: f64,
    pub omega: f64,
    pub m0: f64,
    pub af0: f64,
    pub af1: f64,
}

/// Klobuchar ionosphere model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IonParams {
    pub alpha: [f64; 4],
    pub beta: [f64; 4],
}

/// GPS-UTC conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtcParams {
    pub a0: f64,
    pub a1: f64,
    /// Reference time of the parameters, seconds of week.
    pub tot: f64,
    /// Reference week, truncated to 8 bits.
    pub week: u16,
}

/// Data recovered from one almanac subframe (id 4 or 5) page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageData {
    Almanac(Almanac),
    IonUtc {
        ion: IonParams,
        utc: UtcParams,
        leap_seconds: i8,
    },
}

/// Current navigation data for the receiver session.
///
/// Entries are only ever replaced by successfully decoded newer data;
/// malformed input leaves them untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationData {
    pub ephemeris: [Option<Ephemeris>; MAX_SATS],
    pub almanac: [Option<Almanac>; MAX_SATS],
    pub ion: Option<IonParams>,
    pub utc: Option<UtcParams>,
    pub leap_seconds: Option<i8>,
}

/// Per-satellite store of the most recent content of each of the five
/// GPS subframes, packed 30 bytes each after parity removal.
///
/// Slots persist until overwritten by a newer copy of the same id.
#[derive(Clone)]
pub(crate) struct SubframeStore {
    frames: [[u8; 150]; MAX_SATS],
    have: [u8; MAX_SATS],
}

impl Default for SubframeStore {
    fn default() -> Self {
        SubframeStore {
            frames: [[0u8; 150]; MAX_SATS],
            have: [0u8; MAX_SATS],
        }
    }
}

impl SubframeStore {
    /// Store `subframe` as the current id `id` (1..=5) content for `sat`.
    pub fn store(&mut self, sat: Sat, id: u8, subframe: &[u8; 30]) {
        let off = usize::from(id - 1) * 30;
        self.frames[sat.index()][off..off + 30].copy_from_slice(subframe);
        self.have[sat.index()] |= 1 << (id - 1);
    }

    pub fn has(&self, sat: Sat, id: u8) -> bool {
        self.have[sat.index()] & (1 << (id - 1)) != 0
    }

    pub fn has_all(&self, sat: Sat, ids: &[u8]) -> bool {
        ids.iter().all(|&id| self.has(sat, id))
    }

    /// The 30 packed bytes of subframe `id`.
    pub fn subframe(&self, sat: Sat, id: u8) -> &[u8] {
        let off = usize::from(id - 1) * 30;
        &self.frames[sat.index()][off..off + 30]
    }

    /// Subframes 1..=3 concatenated, for ephemeris decoding.
    pub fn ephemeris_frames(&self, sat: Sat) -> &[u8] {
        &self.frames[sat.index()][..90]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subframe_store_tracks_ids() {
        let mut store = SubframeStore::default();
        let sat = Sat::from_gps_prn(9).unwrap();
        assert!(!store.has(sat, 3));

        store.store(sat, 3, &[3u8; 30]);
        store.store(sat, 1, &[1u8; 30]);
        assert!(store.has(sat, 1));
        assert!(store.has(sat, 3));
        assert!(!store.has_all(sat, &[1, 2, 3]));

        store.store(sat, 2, &[2u8; 30]);
        assert!(store.has_all(sat, &[1, 2, 3]));
        assert_eq!(store.subframe(sat, 2), &[2u8; 30]);
        assert_eq!(&store.ephemeris_frames(sat)[30..60], &[2u8; 30]);

        // other satellites are unaffected
        let other = Sat::from_gps_prn(10).unwrap();
        assert!(!store.has(other, 1));
    }

    #[test]
    fn store_overwrites_in_place() {
        let mut store = SubframeStore::default();
        let sat = Sat::from_gps_prn(1).unwrap();
        store.store(sat, 5, &[0xaa; 30]);
        store.store(sat, 5, &[0xbb; 30]);
        assert_eq!(store.subframe(sat, 5), &[0xbb; 30]);
    }
}
