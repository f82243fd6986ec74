//! Single-recording archive
//!
//! Loading reads the member list once, pulls out the top header and (if
//! present) the shared header, then walks the remaining members in listing
//! order. Segment headers are parsed and link-resolved during the walk;
//! channel data is decoded once the walk has seen every header, so a `.dat`
//! member may precede its segment header in the container.

use super::entry::{EntryKind, SHARED_HEADER, TOP_HEADER, classify_entry};
use super::segment::{ChannelTable, Segment};
use super::source::{EntrySource, ZipSource};
use crate::decode::ConversionMode;
use crate::diagnostics::{TracingSink, Warning, WarningSink, emit};
use crate::options::LoadOptions;
use crate::properties::{ParameterTree, count_link_markers, parse_properties_bytes, resolve_links};
use crate::{JpkError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Top-header keys that may name the recording type
const KIND_PATHS: &[&str] = &["type", "force-scan-series.header.type"];

/// Recording type declared by the top header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `simple-force-scan-series-header` (`.jpk-force`)
    Force,
    /// `nt-force-scan-series-header` (`.jpk-nt-force`)
    NtForce,
    Other(String),
    /// Header declares no type
    Unknown,
}

impl ArchiveKind {
    fn from_type(value: &str) -> Self {
        match value {
            "simple-force-scan-series-header" => ArchiveKind::Force,
            "nt-force-scan-series-header" => ArchiveKind::NtForce,
            other => ArchiveKind::Other(other.to_string()),
        }
    }
}

/// One recording: global parameters plus its segments
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    parameters: ParameterTree,
    shared: Option<Arc<ParameterTree>>,
    segments: BTreeMap<usize, Segment>,
    options: LoadOptions,
}

impl ArchiveFile {
    /// Open an archive from disk with default options
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
        let mut members = source.member_names();
        let parameters = read_top_header(source, &mut members)?;

        let shared = match take_member(&mut members, SHARED_HEADER) {
            Some(name) => {
                debug!("Archive has a shared header");
                Some(Arc::new(read_header(source, &name)?))
            }
            None => None,
        };

        Self::build(source, members, parameters, shared, options, sink)
    }

    /// Load one map pixel, whose shared header lives in the enclosing map
    pub(crate) fn load_with_shared<S: EntrySource + ?Sized>(
        source: &mut S,
        shared: Option<Arc<ParameterTree>>,
        options: &LoadOptions,
        sink: &mut dyn WarningSink,
    ) -> Result<Self> {
        let mut members = source.member_names();
        let parameters = read_top_header(source, &mut members)?;
        Self::build(source, members, parameters, shared, options, sink)
    }

    fn build<S: EntrySource + ?Sized>(
        source: &mut S,
        members: Vec<String>,
        parameters: ParameterTree,
        shared: Option<Arc<ParameterTree>>,
        options: &LoadOptions,
        sink: &mut dyn WarningSink,
    ) -> Result<Self> {
        let mut segments = BTreeMap::new();
        let mut pending = Vec::new();

        for name in members {
            let kind = classify_entry(&name);
            if let Some(index) = kind.segment() {
                segment_slot(&mut segments, index, &shared, options);
            }

            match kind {
                EntryKind::SegmentHeader { segment } => {
                    let mut header = read_header(source, &name)?;
                    match &shared {
                        Some(shared) => {
                            let merged = resolve_links(&mut header, shared, options.trace_links)?;
                            debug!("Segment {}: resolved {} shared link(s)", segment, merged);
                        }
                        None => {
                            let links = count_link_markers(&header);
                            if links > 0 {
                                emit(sink, Warning::UnresolvedLinks { segment, links });
                            }
                        }
                    }
                    segment_slot(&mut segments, segment, &shared, options).set_header(header)?;
                }
                EntryKind::ChannelData { segment, channel } => {
                    pending.push((segment, channel, name));
                }
                EntryKind::Foreign => emit(sink, Warning::ForeignEntry { path: name }),
                EntryKind::TopHeader
                | EntryKind::SharedHeader
                | EntryKind::SegmentMember { .. }
                | EntryKind::Ignored => {}
            }
        }

        for (segment, channel, name) in pending {
            let bytes = source.read_member(&name)?;
            segment_slot(&mut segments, segment, &shared, options).insert_channel(&channel, &bytes)?;
        }

        if let Some(&last) = segments.keys().next_back() {
            for missing in (0..=last).filter(|i| !segments.contains_key(i)) {
                emit(sink, Warning::SegmentGap { missing });
            }
        }

        info!(
            "Loaded archive with {} segment(s){}",
            segments.len(),
            if shared.is_some() { ", shared header" } else { "" }
        );

        Ok(Self {
            parameters,
            shared,
            segments,
            options: options.clone(),
        })
    }

    /// Top-level header
    pub fn parameters(&self) -> &ParameterTree {
        &self.parameters
    }

    /// Shared header, if the archive (or its map) has one
    pub fn shared_parameters(&self) -> Option<&ParameterTree> {
        self.shared.as_deref()
    }

    pub fn has_shared_header(&self) -> bool {
        self.shared.is_some()
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn archive_kind(&self) -> ArchiveKind {
        KIND_PATHS
            .iter()
            .find_map(|path| self.parameters.find_scalar(path))
            .map_or(ArchiveKind::Unknown, ArchiveKind::from_type)
    }

    /// Segments in index order
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(&index)
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Channels of every segment joined end to end, using the load-time mode
    pub fn concatenate_channels(&self, names: &[&str], decode: bool) -> Result<ChannelTable> {
        self.concatenate_channels_with(names, decode, &self.options.conversion_mode, &mut TracingSink)
    }

    /// Channels of every segment joined end to end, in segment order
    ///
    /// Every segment must carry every requested channel, and a channel's unit
    /// must be the same in all of them.
    pub fn concatenate_channels_with(
        &self,
        names: &[&str],
        decode: bool,
        mode: &ConversionMode,
        sink: &mut dyn WarningSink,
    ) -> Result<ChannelTable> {
        if names.is_empty() {
            return Err(JpkError::EmptyChannelRequest);
        }

        let mut first_missing = None;
        for segment in self.segments.values() {
            if let Some(channel) = names.iter().find(|name| !segment.has_channel(name)) {
                emit(
                    sink,
                    Warning::ChannelNotInAllSegments {
                        channel: channel.to_string(),
                        segment: segment.index(),
                    },
                );
                first_missing.get_or_insert((channel.to_string(), segment.index()));
            }
        }
        if let Some((channel, segment)) = first_missing {
            return Err(JpkError::ChannelMissingFromSegment { channel, segment });
        }

        let mut table = ChannelTable::default();
        for segment in self.segments.values() {
            table.append(segment.get_channels_with(names, decode, mode, sink)?)?;
        }
        Ok(table)
    }
}

fn segment_slot<'a>(
    segments: &'a mut BTreeMap<usize, Segment>,
    index: usize,
    shared: &Option<Arc<ParameterTree>>,
    options: &LoadOptions,
) -> &'a mut Segment {
    segments.entry(index).or_insert_with(|| {
        debug!("Allocating segment {}", index);
        Segment::new(index, shared.clone(), options.conversion_mode.clone())
    })
}

fn take_member(members: &mut Vec<String>, name: &str) -> Option<String> {
    let position = members.iter().position(|m| m == name)?;
    Some(members.remove(position))
}

fn read_top_header<S: EntrySource + ?Sized>(
    source: &mut S,
    members: &mut Vec<String>,
) -> Result<ParameterTree> {
    let name = take_member(members, TOP_HEADER).ok_or(JpkError::MissingTopHeader)?;
    read_header(source, &name)
}

fn read_header<S: EntrySource + ?Sized>(source: &mut S, name: &str) -> Result<ParameterTree> {
    parse_properties_bytes(&source.read_member(name)?)
}
