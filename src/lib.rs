//! JPK archive reader with physically calibrated channel decoding
//!
//! This library reads the zip-based archives written by JPK force-spectroscopy
//! instruments (`.jpk-force`, `.jpk-nt-force`, `.jpk-force-map`) and turns the
//! raw binary channels into calibrated sample sequences with physical units.
//!
//! # Architecture
//!
//! - **Properties**: nested `dotted.key=value` header files parsed into a
//!   [`ParameterTree`], with shared-header links merged in
//! - **Decode**: fixed-width big-endian sample decoding and the affine
//!   conversion chain that calibrates it
//! - **Archive**: member classification, [`Segment`]s, single-recording
//!   [`ArchiveFile`]s and composite [`ArchiveMap`]s built over prefix-scoped
//!   [`VirtualSubArchive`] views
//!
//! # Example
//!
//! ```no_run
//! use jpk::ArchiveFile;
//!
//! let archive = ArchiveFile::open("curve.jpk-force")?;
//! let table = archive.concatenate_channels(&["height", "vDeflection"], true)?;
//! println!("height in {}", table.unit("height").unwrap_or("?"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;

pub mod archive;
pub mod decode;
pub mod diagnostics;
pub mod options;
pub mod properties;

// Re-export the archive entities
pub use archive::{
    ArchiveFile, ArchiveKind, ArchiveMap, ChannelRaw, ChannelTable, EntryKind, EntrySource,
    InfoKey, MemorySource, PixelPosition, PositionPattern, Segment, VirtualSubArchive, ZipSource,
    classify_entry,
};

// Re-export decoding types
pub use decode::{ConversionMode, SampleType, Scaling, decode_samples};

// Re-export header types
pub use properties::{HeaderDate, ParameterTree, PropertyNode, parse_properties, resolve_links};

pub use diagnostics::{TracingSink, Warning, WarningCollector, WarningSink};
pub use options::LoadOptions;

#[derive(Error, Debug)]
pub enum JpkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive member not found: {0}")]
    MissingMember(String),

    #[error("Archive has no top-level header.properties")]
    MissingTopHeader,

    #[error("Segment {segment} has channel data but no segment header")]
    MissingSegmentHeader { segment: usize },

    #[error("Malformed header line {line}: '{content}' (expected key=value)")]
    MalformedHeaderLine { line: usize, content: String },

    #[error("Header path '{path}' is used both as a value and as a parent key")]
    PropertyPathConflict { path: String },

    #[error("Conflicting values while merging shared header at '{path}'")]
    HeaderMergeConflict { path: String },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Parameter '{path}' is not a {expected}")]
    UnexpectedNode { path: String, expected: &'static str },

    #[error("Parameter '{path}' has invalid value '{value}'")]
    InvalidValue { path: String, value: String },

    #[error("Unknown sample data type: {0}")]
    UnknownDataType(String),

    #[error("Decoded {found} samples (+{trailing} trailing bytes), header declares {expected}")]
    SampleCountMismatch {
        expected: usize,
        found: usize,
        trailing: usize,
    },

    #[error("Conversion step '{step}' has no parameters in the header")]
    UnknownConversionStep { step: String },

    #[error("Conversion step '{step}' is marked as not defined in the header")]
    ConversionStepUndefined { step: String },

    #[error("Unsupported conversion style '{style}' (only offsetmultiplier is handled)")]
    UnsupportedConversionStyle { style: String },

    #[error("Conversion chain loops back to step '{step}'")]
    ConversionCycle { step: String },

    #[error("No channels requested")]
    EmptyChannelRequest,

    #[error("Channel '{channel}' not present in segment {segment}")]
    UnknownChannel { segment: usize, channel: String },

    #[error("Channel '{channel}' has {found} points, expected {expected}")]
    ChannelLengthMismatch {
        channel: String,
        expected: usize,
        found: usize,
    },

    #[error("Channel '{channel}' missing from segment {segment}, cannot concatenate")]
    ChannelMissingFromSegment { channel: String, segment: usize },

    #[error("Channel '{channel}' unit changes from '{expected}' to '{found}' between segments")]
    UnitMismatchOnConcatenate {
        channel: String,
        expected: String,
        found: String,
    },

    #[error("Pixel index {position} out of range for {rows}x{cols} grid")]
    PixelIndexOutOfRange {
        position: String,
        rows: usize,
        cols: usize,
    },

    #[error("Map has no pixel with flat index {0}")]
    PixelNotFound(usize),

    #[error("Grid coordinates given, but map position pattern is '{0}'")]
    NotAGrid(String),
}

pub type Result<T> = std::result::Result<T, JpkError>;
