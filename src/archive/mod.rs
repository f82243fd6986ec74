//! Archive containers
//!
//! - **entry**: member path classification
//! - **source**: zip, in-memory and prefix-scoped member sources
//! - **segment**: one recording phase and its channel tables
//! - **file**: single-recording archives (`.jpk-force`, `.jpk-nt-force`)
//! - **map**: pixel maps (`.jpk-force-map`, `.jpk-qi-data`)

pub mod entry;
mod file;
mod map;
mod segment;
mod source;

pub use entry::{EntryKind, classify_entry};
pub use file::{ArchiveFile, ArchiveKind};
pub use map::{ArchiveMap, PixelPosition, PositionPattern};
pub use segment::{ChannelRaw, ChannelTable, InfoKey, Segment, TIME_CHANNEL, TIME_UNIT};
pub use source::{EntrySource, MemorySource, VirtualSubArchive, ZipSource};
