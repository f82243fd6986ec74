//! Channel decoding
//!
//! - **samples**: `.dat` bytes into raw digital samples
//! - **conversion**: encoder and conversion-chain calibration to physical units

pub mod conversion;
mod samples;

pub use conversion::{
    Calibrated, ConversionMode, DIGITAL_UNIT, Scaling, calibrate, default_chain,
    resolve_auto_chain,
};
pub use samples::{SampleType, decode_samples};
