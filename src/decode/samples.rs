//! Channel sample decoding
//!
//! `.dat` members are a plain concatenation of fixed-width big-endian values.
//! The element type comes from the sibling segment header.

use crate::{JpkError, Result};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::str::FromStr;

/// Element type of a channel's `.dat` member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// 2-byte signed integer (`short`, `short-data`)
    Short,
    /// 2-byte unsigned integer (`unsignedshort`)
    UnsignedShort,
    /// 4-byte signed integer (`integer-data`, `signedinteger`)
    Integer,
    /// 4-byte IEEE float (`float-data`)
    Float,
}

impl SampleType {
    /// Width of one sample in bytes
    pub fn width(self) -> usize {
        match self {
            SampleType::Short | SampleType::UnsignedShort => 2,
            SampleType::Integer | SampleType::Float => 4,
        }
    }

    #[inline]
    fn read(self, chunk: &[u8]) -> f64 {
        match self {
            SampleType::Short => f64::from(BigEndian::read_i16(chunk)),
            SampleType::UnsignedShort => f64::from(BigEndian::read_u16(chunk)),
            SampleType::Integer => f64::from(BigEndian::read_i32(chunk)),
            SampleType::Float => f64::from(BigEndian::read_f32(chunk)),
        }
    }
}

impl FromStr for SampleType {
    type Err = JpkError;

    fn from_str(keyword: &str) -> Result<Self> {
        match keyword.trim() {
            "short" | "short-data" => Ok(SampleType::Short),
            "unsignedshort" => Ok(SampleType::UnsignedShort),
            "integer-data" | "signedinteger" => Ok(SampleType::Integer),
            "float-data" => Ok(SampleType::Float),
            other => Err(JpkError::UnknownDataType(other.to_string())),
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SampleType::Short => "short",
            SampleType::UnsignedShort => "unsignedshort",
            SampleType::Integer => "integer-data",
            SampleType::Float => "float-data",
        };
        f.write_str(name)
    }
}

/// Decode `bytes` into exactly `expected` samples
///
/// A blob whose length is not `expected * width` (including a truncated final
/// chunk) is rejected with [`JpkError::SampleCountMismatch`].
pub fn decode_samples(bytes: &[u8], sample_type: SampleType, expected: usize) -> Result<Vec<f64>> {
    let width = sample_type.width();
    let chunks = bytes.chunks_exact(width);
    let trailing = chunks.remainder().len();
    let found = chunks.len();

    if found != expected || trailing != 0 {
        return Err(JpkError::SampleCountMismatch {
            expected,
            found,
            trailing,
        });
    }

    Ok(chunks.map(|chunk| sample_type.read(chunk)).collect())
}
