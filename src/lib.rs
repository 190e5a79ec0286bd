#![doc = include_str!("../README.md")]

mod decoder;
mod error;
mod fields;
pub mod framing;
pub mod gps;
pub mod nav;

pub use decoder::{Decoder, Update, MAX_CHANNELS};
pub use error::{Error, Result};
