//! Force and QI maps
//!
//! A map nests one complete single-recording layout per pixel under
//! `index/<I>/`, next to a top header describing the scan pattern and an
//! optional shared header used by every pixel. Each pixel is loaded as an
//! [`ArchiveFile`] over a [`VirtualSubArchive`] of the map container.

use super::entry::{MapEntryKind, classify_map_entry, pixel_prefix};
use super::file::ArchiveFile;
use super::source::{EntrySource, VirtualSubArchive, ZipSource};
use crate::diagnostics::{TracingSink, Warning, WarningSink, emit};
use crate::options::LoadOptions;
use crate::properties::{ParameterTree, parse_properties_bytes};
use crate::{JpkError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Top-header subtrees describing the scan pattern, by map flavour
const PATTERN_PATHS: &[&str] = &[
    "force-scan-map.position-pattern",
    "quantitative-imaging-map.position-pattern",
];
const GRID_PATTERN: &str = "grid-position-pattern";

/// Layout of the pixels of a map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionPattern {
    /// `ilength` rows of `jlength` pixels, stored row-major
    Grid { ilength: usize, jlength: usize },
    /// Any other declared pattern type
    Other(String),
    /// Header has no position pattern
    Unspecified,
}

impl PositionPattern {
    /// Read the pattern from a map's top header
    pub fn from_header(parameters: &ParameterTree) -> Result<Self> {
        let Some(pattern) = PATTERN_PATHS
            .iter()
            .find_map(|path| parameters.find_subtree(path))
        else {
            return Ok(PositionPattern::Unspecified);
        };

        let kind = pattern.scalar("type")?;
        if kind != GRID_PATTERN {
            return Ok(PositionPattern::Other(kind.to_string()));
        }
        Ok(PositionPattern::Grid {
            ilength: pattern.value("grid.ilength")?,
            jlength: pattern.value("grid.jlength")?,
        })
    }

    /// `(rows, cols)` of a grid
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        match self {
            PositionPattern::Grid { ilength, jlength } => Some((*ilength, *jlength)),
            _ => None,
        }
    }
}

impl fmt::Display for PositionPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PositionPattern::Grid { ilength, jlength } => {
                write!(f, "{} {}x{}", GRID_PATTERN, ilength, jlength)
            }
            PositionPattern::Other(kind) => f.write_str(kind),
            PositionPattern::Unspecified => f.write_str("unspecified"),
        }
    }
}

/// Address of one pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelPosition {
    /// Flat pixel index as stored in the container
    Flat(usize),
    /// `(i, j)` grid coordinates
    Grid(usize, usize),
}

impl From<usize> for PixelPosition {
    fn from(index: usize) -> Self {
        PixelPosition::Flat(index)
    }
}

impl From<(usize, usize)> for PixelPosition {
    fn from((i, j): (usize, usize)) -> Self {
        PixelPosition::Grid(i, j)
    }
}

impl fmt::Display for PixelPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PixelPosition::Flat(index) => write!(f, "{}", index),
            PixelPosition::Grid(i, j) => write!(f, "({}, {})", i, j),
        }
    }
}

/// Map archive: one [`ArchiveFile`] per pixel
#[derive(Debug, Clone)]
pub struct ArchiveMap {
    parameters: ParameterTree,
    shared: Option<Arc<ParameterTree>>,
    pattern: PositionPattern,
    pixels: BTreeMap<usize, ArchiveFile>,
}

impl ArchiveMap {
    /// Open a map from disk with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &LoadOptions::default(), &mut TracingSink)
    }

    pub fn open_with<P: AsRef<Path>>(
        path: P,
        options: &LoadOptions,
        sink: &mut dyn WarningSink,
    ) -> Result<Self> {
        let mut source = ZipSource::open(path)?;
        Self::load(&mut source, options, sink)
    }

    /// Load from any member source
    pub fn load<S: EntrySource + ?Sized>(
        source: &mut S,
        options: &LoadOptions,
        sink: &mut dyn WarningSink,
    ) -> Result<Self> {
        let mut top = None;
        let mut shared_header = None;
        let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();

        for name in source.member_names() {
            match classify_map_entry(&name) {
                MapEntryKind::TopHeader => top = Some(name.clone()),
                MapEntryKind::SharedHeader => shared_header = Some(name.clone()),
                MapEntryKind::Pixel { index, member } => {
                    groups.entry(index).or_default().push(member.to_string())
                }
                MapEntryKind::Foreign => emit(sink, Warning::ForeignEntry { path: name.clone() }),
                MapEntryKind::Ignored => {}
            }
        }

        let top = top.ok_or(JpkError::MissingTopHeader)?;
        let parameters = parse_properties_bytes(&source.read_member(&top)?)?;
        let pattern = PositionPattern::from_header(&parameters)?;

        let shared = match shared_header {
            Some(name) => Some(Arc::new(parse_properties_bytes(&source.read_member(&name)?)?)),
            None => None,
        };

        let mut pixels = BTreeMap::new();
        for (index, members) in groups {
            let mut view = VirtualSubArchive::new(&mut *source, members, pixel_prefix(index));
            debug!("Loading pixel {} from '{}'", index, view.prefix());
            let pixel = ArchiveFile::load_with_shared(&mut view, shared.clone(), options, sink)?;
            pixels.insert(index, pixel);
        }

        info!("Loaded map with {} pixel(s), pattern {}", pixels.len(), pattern);

        Ok(Self {
            parameters,
            shared,
            pattern,
            pixels,
        })
    }

    /// Top-level header
    pub fn parameters(&self) -> &ParameterTree {
        &self.parameters
    }

    pub fn shared_parameters(&self) -> Option<&ParameterTree> {
        self.shared.as_deref()
    }

    pub fn has_shared_header(&self) -> bool {
        self.shared.is_some()
    }

    pub fn pattern(&self) -> &PositionPattern {
        &self.pattern
    }

    /// Number of pixels present in the container
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Pixels by flat index
    pub fn pixels(&self) -> impl Iterator<Item = (usize, &ArchiveFile)> {
        self.pixels.iter().map(|(index, pixel)| (*index, pixel))
    }

    /// Flat index for a position
    ///
    /// Grid coordinates resolve row-major as `i * jlength + j`. A flat index
    /// on a grid map is taken as is, with a [`Warning::GridIndexBypassed`].
    pub fn flat_index(&self, position: PixelPosition, sink: &mut dyn WarningSink) -> Result<usize> {
        match (position, &self.pattern) {
            (PixelPosition::Grid(i, j), PositionPattern::Grid { ilength, jlength }) => {
                if i >= *ilength || j >= *jlength {
                    return Err(JpkError::PixelIndexOutOfRange {
                        position: position.to_string(),
                        rows: *ilength,
                        cols: *jlength,
                    });
                }
                Ok(i * jlength + j)
            }
            (PixelPosition::Grid(..), pattern) => Err(JpkError::NotAGrid(pattern.to_string())),
            (PixelPosition::Flat(index), PositionPattern::Grid { .. }) => {
                emit(sink, Warning::GridIndexBypassed { index });
                Ok(index)
            }
            (PixelPosition::Flat(index), _) => Ok(index),
        }
    }

    /// Pixel at `position`, logging any warning
    pub fn pixel(&self, position: impl Into<PixelPosition>) -> Result<&ArchiveFile> {
        self.pixel_with(position, &mut TracingSink)
    }

    pub fn pixel_with(
        &self,
        position: impl Into<PixelPosition>,
        sink: &mut dyn WarningSink,
    ) -> Result<&ArchiveFile> {
        let index = self.flat_index(position.into(), sink)?;
        self.pixels.get(&index).ok_or(JpkError::PixelNotFound(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::source::MemorySource;
    use crate::diagnostics::WarningCollector;

    const DATE: &str = "#Tue Aug 02 09:12:44 UTC 2016";

    fn grid_header(rows: usize, cols: usize) -> String {
        format!(
            "{DATE}\n\
             type=force-scan-map\n\
             force-scan-map.position-pattern.type=grid-position-pattern\n\
             force-scan-map.position-pattern.grid.ilength={rows}\n\
             force-scan-map.position-pattern.grid.jlength={cols}\n"
        )
    }

    fn grid_map(rows: usize, cols: usize) -> ArchiveMap {
        let mut source = MemorySource::new().with_member("header.properties", grid_header(rows, cols));
        ArchiveMap::load(&mut source, &LoadOptions::default(), &mut TracingSink).unwrap()
    }

    fn pixel_members(source: MemorySource, index: usize, value: i16) -> MemorySource {
        let prefix = pixel_prefix(index);
        let header = format!(
            "{DATE}\n\
             force-segment-header.duration=1.0\n\
             force-segment-header.num-points=1\n\
             channel.height.lcd-info.*=0\n"
        );
        source
            .with_member(format!("{prefix}header.properties"), DATE)
            .with_member(format!("{prefix}segments/0/segment-header.properties"), header)
            .with_member(
                format!("{prefix}segments/0/channels/height.dat"),
                value.to_be_bytes().to_vec(),
            )
    }

    #[test]
    fn test_pattern_from_header() {
        let map = grid_map(3, 4);
        assert_eq!(
            map.pattern(),
            &PositionPattern::Grid {
                ilength: 3,
                jlength: 4
            }
        );
        assert_eq!(map.pattern().dimensions(), Some((3, 4)));
        assert!(map.is_empty());
    }

    #[test]
    fn test_grid_lookup() {
        let map = grid_map(3, 4);
        let mut warnings = WarningCollector::new();

        assert_eq!(map.flat_index(PixelPosition::Grid(1, 2), &mut warnings).unwrap(), 6);
        assert_eq!(map.flat_index(PixelPosition::Grid(2, 3), &mut warnings).unwrap(), 11);
        assert!(matches!(
            map.flat_index(PixelPosition::Grid(3, 0), &mut warnings),
            Err(JpkError::PixelIndexOutOfRange { rows: 3, cols: 4, .. })
        ));
        assert!(matches!(
            map.flat_index(PixelPosition::Grid(0, 4), &mut warnings),
            Err(JpkError::PixelIndexOutOfRange { .. })
        ));
        assert!(warnings.is_empty());

        assert_eq!(map.flat_index(PixelPosition::Flat(7), &mut warnings).unwrap(), 7);
        assert_eq!(
            warnings.warnings(),
            &[Warning::GridIndexBypassed { index: 7 }]
        );
    }

    #[test]
    fn test_non_grid_pattern() {
        let header = format!(
            "{DATE}\nquantitative-imaging-map.position-pattern.type=list-position-pattern\n"
        );
        let mut source = MemorySource::new().with_member("header.properties", header);
        let map = ArchiveMap::load(&mut source, &LoadOptions::default(), &mut TracingSink).unwrap();

        assert_eq!(
            map.pattern(),
            &PositionPattern::Other("list-position-pattern".to_string())
        );
        assert!(matches!(
            map.pixel(PixelPosition::Grid(0, 0)),
            Err(JpkError::NotAGrid(ref p)) if p == "list-position-pattern"
        ));
        assert!(matches!(map.pixel(0usize), Err(JpkError::PixelNotFound(0))));
    }

    #[test]
    fn test_load_pixels_with_shared_header() {
        let shared = format!(
            "{DATE}\n\
             lcd-info.0.type=short\n\
             lcd-info.0.encoder.scaling.style=offsetmultiplier\n\
             lcd-info.0.encoder.scaling.multiplier=0.5\n\
             lcd-info.0.encoder.scaling.offset=0.0\n\
             lcd-info.0.encoder.scaling.unit.unit=V\n"
        );
        let source = MemorySource::new()
            .with_member("header.properties", grid_header(1, 2))
            .with_member("shared-data/header.properties", shared)
            .with_member("index/", Vec::new())
            .with_member("thumbnails/map.png", b"png".to_vec());
        let source = pixel_members(source, 0, 4);
        let mut source = pixel_members(source, 1, 8);

        let mut warnings = WarningCollector::new();
        let map = ArchiveMap::load(&mut source, &LoadOptions::default(), &mut warnings).unwrap();
        assert_eq!(
            warnings.warnings(),
            &[Warning::ForeignEntry {
                path: "thumbnails/map.png".to_string()
            }]
        );

        assert_eq!(map.len(), 2);
        assert!(map.has_shared_header());
        assert_eq!(
            map.pixels().map(|(index, _)| index).collect::<Vec<_>>(),
            vec![0, 1]
        );

        let pixel = map.pixel((0usize, 1usize)).unwrap();
        assert!(pixel.has_shared_header());
        let table = pixel.concatenate_channels(&["height"], true).unwrap();
        assert_eq!(table.column("height").unwrap(), &[4.0]);
        assert_eq!(table.unit("height"), Some("V"));

        assert!(matches!(
            map.pixel(PixelPosition::Grid(1, 0)),
            Err(JpkError::PixelIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_missing_map_header() {
        let mut source = pixel_members(MemorySource::new(), 0, 1);
        assert!(matches!(
            ArchiveMap::load(&mut source, &LoadOptions::default(), &mut TracingSink),
            Err(JpkError::MissingTopHeader)
        ));
    }
}
