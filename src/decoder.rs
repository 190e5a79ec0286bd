//! The per-session decoder: frame acquisition, message dispatch, and
//! the observation/navigation state it maintains.

use std::io::Read;

use tracing::{debug, trace};

use crate::fields::{read_f32, read_f64, read_u16, read_u32, DoubleLayout};
use crate::framing::{acquire, Acquisition, Frame, FrameAccumulator};
use crate::gps::{self, GpsNavDecoder, GpsTime, NavDecoder, Sat, CLIGHT, FREQ_L1, LAMBDA_L1};
use crate::nav::{
    Code, NavigationData, Observation, ObservationEpoch, PageData, SubframeStore,
};
use crate::{Error, Result};

/// Clock status.
pub const MID_CLOCK: u8 = 0x07;
/// 50 bps navigation data.
pub const MID_NAV_DATA: u8 = 0x08;
/// Navigation library measurement.
pub const MID_MEASUREMENT: u8 = 0x1c;

/// Number of receiver tracking channels handled.
pub const MAX_CHANNELS: usize = 32;

/// Total frame length of a clock status message.
const CLOCK_FRAME_LEN: usize = 28;
/// Total frame length of a measurement message.
const MEASUREMENT_FRAME_LEN: usize = 64;
/// Minimum total frame length of a 50 bps message.
const NAV_DATA_MIN_FRAME_LEN: usize = 51;

/// Pending observations farther than this from the clock solution's
/// receive time are dropped from the epoch, s.
const CLOCK_GATE: f64 = 0.1;
/// First and last payload offset of the C/N0 samples in a measurement.
const SNR_FIRST: usize = 38;
const SNR_LAST: usize = 47;
/// Phase error counts at or above this flag a loss of carrier lock.
const MAX_PHASE_ERRORS: u8 = 50;

/// Data produced by one decode step.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// No complete frame yet, or a frame that produced no new data.
    None,
    /// A finalized observation epoch.
    Observations(ObservationEpoch),
    /// New ephemeris for a satellite, readable via
    /// [`Decoder::navigation`].
    Ephemeris(Sat),
    /// Ionosphere/UTC parameters were updated.
    IonUtc,
}

/// One measurement awaiting the clock message that closes its epoch.
#[derive(Debug, Clone, Copy)]
struct PendingObservation {
    sat: Option<Sat>,
    /// Uncorrected signal time, seconds of week.
    time: f64,
    pseudorange: f64,
    carrier_phase: f64,
    doppler: f64,
    snr: f64,
    lock_lost: bool,
}

/// Decoder session for one SiRF byte stream.
///
/// Owns every piece of per-stream state: the frame accumulator, the
/// pending observation table, the per-satellite subframe store, and the
/// navigation database. Streams must not share a session; create one
/// `Decoder` per receiver.
///
/// # Examples
/// ```no_run
/// use std::fs::File;
/// use sirf::{Decoder, Update};
///
/// let mut file = File::open("capture.sirf").unwrap();
/// let mut decoder = Decoder::new();
/// loop {
///     match decoder.decode_next(&mut file) {
///         Ok(None) => break,
///         Ok(Some(Update::Observations(epoch))) => {
///             println!("{} obs at {:?}", epoch.observations.len(), epoch.time);
///         }
///         Ok(Some(_)) => {}
///         Err(err) => eprintln!("skipping frame: {err}"),
///     }
/// }
/// ```
pub struct Decoder {
    accumulator: FrameAccumulator,
    /// Sync search window for the bulk path, carried across
    /// [`decode_next`](Self::decode_next) calls.
    sync_window: [u8; 2],
    double_layout: DoubleLayout,
    force_ephemeris_replace: bool,
    nav_decoder: Box<dyn NavDecoder>,
    pending: [Option<PendingObservation>; MAX_CHANNELS],
    pending_len: usize,
    subframes: SubframeStore,
    nav: NavigationData,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Decoder {
            accumulator: FrameAccumulator::new(),
            sync_window: [0; 2],
            double_layout: DoubleLayout::Standard,
            force_ephemeris_replace: false,
            nav_decoder: Box::new(GpsNavDecoder),
            pending: [None; MAX_CHANNELS],
            pending_len: 0,
            subframes: SubframeStore::default(),
            nav: NavigationData::default(),
        }
    }

    /// Apply a whitespace-separated receiver option string.
    ///
    /// Recognized options:
    /// - `legacy-double-layout`: doubles use the split GSW 2.3 layout
    /// - `force-ephemeris-replace`: store and report every decoded
    ///   ephemeris even when its issue of data is unchanged
    ///
    /// Unrecognized options are ignored.
    #[must_use]
    pub fn with_options(mut self, options: &str) -> Self {
        for opt in options.split_whitespace() {
            match opt {
                "legacy-double-layout" => self.double_layout = DoubleLayout::Split,
                "force-ephemeris-replace" => self.force_ephemeris_replace = true,
                other => debug!(option = other, "ignoring unrecognized option"),
            }
        }
        self
    }

    /// Replace the navigation-data collaborator.
    #[must_use]
    pub fn with_nav_decoder(mut self, nav_decoder: Box<dyn NavDecoder>) -> Self {
        self.nav_decoder = nav_decoder;
        self
    }

    /// Current navigation database: ephemerides, almanac, ion/UTC.
    #[must_use]
    pub fn navigation(&self) -> &NavigationData {
        &self.nav
    }

    /// Feed one stream byte.
    ///
    /// Returns [`Update::None`] until a frame completes; a completed
    /// frame is validated and dispatched before returning.
    ///
    /// # Errors
    /// Framing and message-level errors are scoped to the frame being
    /// processed; the session remains usable and subsequent bytes
    /// resynchronize on the next preamble.
    pub fn feed(&mut self, byte: u8) -> Result<Update> {
        match self.accumulator.push(byte)? {
            Some(frame) => self.decode_frame(&frame),
            None => Ok(Update::None),
        }
    }

    /// Pull bytes from `reader` until one frame is decoded.
    ///
    /// Returns `None` at end of input. A call that scans
    /// [`MAX_SYNC_SEARCH`](crate::framing::MAX_SYNC_SEARCH) bytes
    /// without finding a preamble returns `Some(Update::None)` rather
    /// than blocking indefinitely; a preamble split across that
    /// boundary is picked up by the following call.
    ///
    /// Decoding is identical to the byte-wise path: feeding the same
    /// bytes through [`feed`](Self::feed) yields the same updates and
    /// state.
    ///
    /// # Errors
    /// Same as [`feed`](Self::feed), plus I/O errors from `reader`.
    pub fn decode_next<R: Read>(&mut self, reader: &mut R) -> Result<Option<Update>> {
        match acquire(reader, &mut self.sync_window)? {
            Acquisition::Eof => Ok(None),
            Acquisition::NoSync => Ok(Some(Update::None)),
            Acquisition::Frame(frame) => self.decode_frame(&frame).map(Some),
        }
    }

    fn decode_frame(&mut self, data: &[u8]) -> Result<Update> {
        let frame = Frame::parse(data)?;
        trace!(mid = frame.message_id(), len = frame.len(), "frame");
        match frame.message_id() {
            MID_CLOCK => self.decode_clock(&frame),
            MID_MEASUREMENT => self.decode_measurement(&frame),
            MID_NAV_DATA => self.decode_nav_data(&frame),
            mid => {
                trace!(mid, "unhandled message id");
                Ok(Update::None)
            }
        }
    }

    /// Clock status (mid 7): closes the epoch for all pending
    /// observations near the solved receive time.
    fn decode_clock(&mut self, frame: &Frame) -> Result<Update> {
        if frame.len() != CLOCK_FRAME_LEN {
            return Err(Error::MessageLength {
                mid: MID_CLOCK,
                len: frame.len(),
            });
        }
        let p = frame.payload();
        let week = read_u16(p, 1);
        let tow = f64::from(read_u32(p, 3)) * 0.01;
        let drift = f64::from(read_u32(p, 8));
        let bias = f64::from(read_u32(p, 12)) * 1e-9;
        trace!(week, tow, bias, drift, "clock status");

        let mut observations = Vec::new();
        for slot in self.pending.iter().take(self.pending_len) {
            let Some(pend) = slot else { continue };
            let Some(sat) = pend.sat else { continue };
            if (tow + bias - pend.time).abs() > CLOCK_GATE {
                debug!(sat = %sat, time = pend.time, tow, "pending observation outside clock gate");
                continue;
            }
            let mut carrier_phase = pend.carrier_phase;
            if carrier_phase != 0.0 {
                carrier_phase -= FREQ_L1 * bias;
            }
            observations.push(Observation {
                sat,
                time: GpsTime::new(week, pend.time - bias),
                pseudorange: pend.pseudorange - CLIGHT * bias,
                carrier_phase,
                doppler: pend.doppler + drift,
                snr: pend.snr,
                lock_lost: pend.lock_lost,
                code: Code::L1C,
            });
        }
        self.pending = [None; MAX_CHANNELS];
        self.pending_len = 0;

        if observations.is_empty() {
            return Ok(Update::None);
        }
        observations.sort_by_key(|obs| obs.sat);
        Ok(Update::Observations(ObservationEpoch {
            time: GpsTime::new(week, tow),
            observations,
        }))
    }

    /// Navigation library measurement (mid 28): one channel's raw
    /// tracking data, parked until the next clock status.
    fn decode_measurement(&mut self, frame: &Frame) -> Result<Update> {
        if frame.len() != MEASUREMENT_FRAME_LEN {
            return Err(Error::MessageLength {
                mid: MID_MEASUREMENT,
                len: frame.len(),
            });
        }
        let p = frame.payload();
        let channel = usize::from(p[1]);
        if channel >= MAX_CHANNELS {
            return Err(Error::Channel { channel: p[1] });
        }

        let layout = self.double_layout;
        let snr = p[SNR_FIRST..=SNR_LAST].iter().copied().min().unwrap_or(0);
        let flags = p[37];
        let phase_errors = p[54];

        self.pending[channel] = Some(PendingObservation {
            sat: Sat::from_gps_prn(p[6]),
            time: read_f64(p, 7, layout),
            pseudorange: read_f64(p, 15, layout),
            doppler: -f64::from(read_f32(p, 23)) / LAMBDA_L1,
            carrier_phase: read_f64(p, 27, layout) / LAMBDA_L1,
            snr: f64::from(snr) * 4.0,
            lock_lost: !(flags & 0x02 != 0 && phase_errors < MAX_PHASE_ERRORS),
        });
        self.pending_len = self.pending_len.max(channel + 1);
        Ok(Update::None)
    }

    /// 50 bps navigation data (mid 8): one raw subframe for one
    /// satellite.
    fn decode_nav_data(&mut self, frame: &Frame) -> Result<Update> {
        if frame.len() < NAV_DATA_MIN_FRAME_LEN {
            return Err(Error::MessageLength {
                mid: MID_NAV_DATA,
                len: frame.len(),
            });
        }
        let p = frame.payload();
        let prn = p[2];
        let sat = Sat::from_gps_prn(prn).ok_or(Error::UnknownPrn { prn })?;

        let mut subframe = [0u8; 30];
        for i in 0..10 {
            let word = read_u32(p, 3 + i * 4);
            match self.nav_decoder.decode_word(word) {
                Some(data) => subframe[i * 3..i * 3 + 3].copy_from_slice(&data),
                None => {
                    // expected under weak signal; drop the whole subframe
                    trace!(sat = %sat, word = i, "parity failure");
                    return Ok(Update::None);
                }
            }
        }

        let id = gps::subframe::subframe_id(&subframe);
        if !(1..=5).contains(&id) {
            trace!(sat = %sat, id, "subframe id out of range");
            return Ok(Update::None);
        }
        trace!(sat = %sat, id, "subframe stored");
        self.subframes.store(sat, id, &subframe);

        match id {
            3 => Ok(self.decode_ephemeris(sat)),
            // ion/utc pages need the prior subframe 5 content
            4 if self.subframes.has(sat, 5) => Ok(self.store_page(sat, 4)),
            5 => Ok(self.store_page(sat, 5)),
            _ => Ok(Update::None),
        }
    }

    fn decode_ephemeris(&mut self, sat: Sat) -> Update {
        if !self.subframes.has_all(sat, &[1, 2, 3]) {
            return Update::None;
        }
        let Some(eph) = self
            .nav_decoder
            .decode_ephemeris(sat, self.subframes.ephemeris_frames(sat))
        else {
            return Update::None;
        };
        if !self.force_ephemeris_replace {
            if let Some(current) = &self.nav.ephemeris[sat.index()] {
                if current.iode == eph.iode {
                    trace!(sat = %sat, iode = eph.iode, "ephemeris unchanged");
                    return Update::None;
                }
            }
        }
        debug!(sat = %sat, iode = eph.iode, "new ephemeris");
        self.nav.ephemeris[sat.index()] = Some(eph);
        Update::Ephemeris(sat)
    }

    fn store_page(&mut self, sat: Sat, id: u8) -> Update {
        match self.nav_decoder.decode_page(self.subframes.subframe(sat, id)) {
            Some(PageData::Almanac(alm)) => {
                trace!(sat = %alm.sat, "almanac page");
                self.nav.almanac[alm.sat.index()] = Some(alm);
                Update::None
            }
            Some(PageData::IonUtc {
                ion,
                utc,
                leap_seconds,
            }) => {
                debug!(leap_seconds, "ion/utc parameters");
                self.nav.ion = Some(ion);
                self.nav.utc = Some(utc);
                self.nav.leap_seconds = Some(leap_seconds);
                Update::IonUtc
            }
            None => Update::None,
        }
    }
}
