//! Segments and channel tables
//!
//! A segment is one phase of a recording (extend, pause, retract). It owns
//! its link-resolved header, the time base derived from `duration` and
//! `num-points`, and the raw digital samples of every channel found in its
//! folder together with the metadata needed to calibrate them.

use crate::decode::{Calibrated, ConversionMode, DIGITAL_UNIT, SampleType, calibrate, decode_samples};
use crate::diagnostics::{TracingSink, WarningSink};
use crate::properties::{LINK_MARKER, ParameterTree};
use crate::{JpkError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Pseudo-channel holding the time base
pub const TIME_CHANNEL: &str = "t";
/// Unit of the time base
pub const TIME_UNIT: &str = "s";

const CHANNEL_KEY: &str = "channel";
const DURATION_PATH: &str = "force-segment-header.duration";
const NUM_POINTS_PATH: &str = "force-segment-header.num-points";
const STYLE_PATH: &str = "force-segment-header.settings.style";
const STYLE_LINK_PATH: &str = "force-segment-header.force-segment-header-info";
const SHARED_STYLE_POOL: &str = "force-segment-header-info";
const CHANNEL_LIST_PATH: &str = "channels.list";

/// Raw samples of one channel plus the parameters needed to calibrate them
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRaw {
    /// Digital samples, in file order
    pub samples: Vec<f64>,
    /// `encoder` step, if the header has one
    pub encoder: Option<ParameterTree>,
    /// `conversion-set`, if the header has one with at least one step
    pub conversion_set: Option<ParameterTree>,
}

/// Named per-segment facts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKey {
    /// Segment style (`extend`, `retract`, `pause`, ...)
    Type,
    /// Space-separated channel list
    Channels,
    NumPoints,
    /// Duration in seconds
    Duration,
}

/// Equal-length columns keyed by channel name, with a unit per column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelTable {
    columns: Vec<(String, Vec<f64>)>,
    units: BTreeMap<String, String>,
}

impl ChannelTable {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names in request order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn unit(&self, name: &str) -> Option<&str> {
        self.units.get(name).map(String::as_str)
    }

    pub fn units(&self) -> &BTreeMap<String, String> {
        &self.units
    }

    /// Add a column, replacing one of the same name
    fn push(&mut self, name: &str, values: Vec<f64>, unit: String) {
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = values,
            None => self.columns.push((name.to_string(), values)),
        }
        self.units.insert(name.to_string(), unit);
    }

    /// Append the rows of `other`, whose columns must carry the same units
    pub(crate) fn append(&mut self, other: ChannelTable) -> Result<()> {
        if self.columns.is_empty() {
            *self = other;
            return Ok(());
        }

        for (name, values) in other.columns {
            let expected = self.units.get(&name).cloned().unwrap_or_default();
            let found = other.units.get(&name).cloned().unwrap_or_default();
            if expected != found {
                return Err(JpkError::UnitMismatchOnConcatenate {
                    channel: name,
                    expected,
                    found,
                });
            }
            match self.columns.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1.extend(values),
                None => {
                    self.units.insert(name.clone(), found);
                    self.columns.push((name, values));
                }
            }
        }
        Ok(())
    }
}

/// One phase of a recording
#[derive(Debug, Clone)]
pub struct Segment {
    index: usize,
    header: ParameterTree,
    has_header: bool,
    shared: Option<Arc<ParameterTree>>,
    time: Vec<f64>,
    channels: BTreeMap<String, ChannelRaw>,
    conversion_mode: ConversionMode,
}

impl Segment {
    pub(crate) fn new(
        index: usize,
        shared: Option<Arc<ParameterTree>>,
        conversion_mode: ConversionMode,
    ) -> Self {
        Self {
            index,
            header: ParameterTree::new(),
            has_header: false,
            shared,
            time: Vec::new(),
            channels: BTreeMap::new(),
            conversion_mode,
        }
    }

    /// Install the parsed (and link-resolved) segment header
    pub(crate) fn set_header(&mut self, header: ParameterTree) -> Result<()> {
        if header.contains(DURATION_PATH) && header.contains(NUM_POINTS_PATH) {
            let duration: f64 = header.value(DURATION_PATH)?;
            let num_points: usize = header.value(NUM_POINTS_PATH)?;
            self.time = time_base(duration, num_points);
            debug!(
                "Segment {}: {} points over {} s",
                self.index, num_points, duration
            );
        } else {
            debug!("Segment {}: header has no time base", self.index);
            self.time.clear();
        }
        self.header = header;
        self.has_header = true;
        Ok(())
    }

    /// Decode one `.dat` member against this segment's header
    pub(crate) fn insert_channel(&mut self, channel: &str, bytes: &[u8]) -> Result<()> {
        if !self.has_header {
            return Err(JpkError::MissingSegmentHeader {
                segment: self.index,
            });
        }

        let prefix = format!("{}.{}", CHANNEL_KEY, channel);
        let params = self.header.subtree(&prefix)?;

        // Plain layout keeps the type under `data`, the shared layout one level up
        let sample_type: SampleType = params
            .find_scalar("data.type")
            .or_else(|| params.find_scalar("type"))
            .ok_or_else(|| JpkError::MissingParameter(format!("{}.data.type", prefix)))?
            .parse()?;

        let expected: usize = if self.header.contains(NUM_POINTS_PATH) {
            self.header.value(NUM_POINTS_PATH)?
        } else {
            params.value("data.num-points")?
        };

        let encoder = params
            .find_subtree("data.encoder")
            .or_else(|| params.find_subtree("encoder"))
            .cloned();
        let conversion_set = params
            .find_subtree("conversion-set")
            .filter(|set| set.contains("conversion"))
            .cloned();

        let samples = decode_samples(bytes, sample_type, expected)?;
        debug!(
            "Segment {}: channel '{}' decoded {} {} samples",
            self.index,
            channel,
            samples.len(),
            sample_type
        );

        self.channels.insert(
            channel.to_string(),
            ChannelRaw {
                samples,
                encoder,
                conversion_set,
            },
        );
        Ok(())
    }

    /// Zero-based position of the segment in its archive
    pub fn index(&self) -> usize {
        self.index
    }

    /// Link-resolved segment header
    pub fn header(&self) -> &ParameterTree {
        &self.header
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    /// Time stamps `i * duration / num_points`, starting at zero
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Time base shifted by `offset` seconds
    pub fn time_with_offset(&self, offset: f64) -> Vec<f64> {
        self.time.iter().map(|t| t + offset).collect()
    }

    /// Names of the decoded channels, sorted
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Whether `name` can be requested (the time channel always can)
    pub fn has_channel(&self, name: &str) -> bool {
        name == TIME_CHANNEL || self.channels.contains_key(name)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelRaw> {
        self.channels.get(name)
    }

    fn raw(&self, name: &str) -> Result<&ChannelRaw> {
        self.channels.get(name).ok_or_else(|| JpkError::UnknownChannel {
            segment: self.index,
            channel: name.to_string(),
        })
    }

    fn channel_len(&self, name: &str) -> Result<usize> {
        if name == TIME_CHANNEL {
            return Ok(self.time.len());
        }
        Ok(self.raw(name)?.samples.len())
    }

    /// Calibrate one channel with the given conversion mode
    pub fn decoded(
        &self,
        channel: &str,
        mode: &ConversionMode,
        sink: &mut dyn WarningSink,
    ) -> Result<Calibrated> {
        let raw = self.raw(channel)?;
        calibrate(
            channel,
            &raw.samples,
            raw.encoder.as_ref(),
            raw.conversion_set.as_ref(),
            mode,
            sink,
        )
    }

    /// Table of the requested channels, using the load-time conversion mode
    pub fn get_channels(&self, names: &[&str], decode: bool) -> Result<ChannelTable> {
        self.get_channels_with(names, decode, &self.conversion_mode, &mut TracingSink)
    }

    /// Table of the requested channels
    ///
    /// Every column must be as long as the first requested one. With `decode`
    /// unset the raw digital samples are returned with unit `digital`.
    pub fn get_channels_with(
        &self,
        names: &[&str],
        decode: bool,
        mode: &ConversionMode,
        sink: &mut dyn WarningSink,
    ) -> Result<ChannelTable> {
        let Some(first) = names.first() else {
            return Err(JpkError::EmptyChannelRequest);
        };
        let expected = self.channel_len(first)?;

        let mut table = ChannelTable::default();
        for &name in names {
            let (values, unit) = if name == TIME_CHANNEL {
                (self.time.clone(), TIME_UNIT.to_string())
            } else if decode {
                let calibrated = self.decoded(name, mode, sink)?;
                (calibrated.values, calibrated.unit)
            } else {
                (self.raw(name)?.samples.clone(), DIGITAL_UNIT.to_string())
            };

            if values.len() != expected {
                return Err(JpkError::ChannelLengthMismatch {
                    channel: name.to_string(),
                    expected,
                    found: values.len(),
                });
            }
            table.push(name, values, unit);
        }
        Ok(table)
    }

    /// One named fact about the segment, as written in the header
    pub fn info(&self, key: InfoKey) -> Result<String> {
        let value = match key {
            InfoKey::Channels => self.header.scalar(CHANNEL_LIST_PATH)?,
            InfoKey::NumPoints => self.header.scalar(NUM_POINTS_PATH)?,
            InfoKey::Duration => self.header.scalar(DURATION_PATH)?,
            InfoKey::Type => return self.style(),
        };
        Ok(value.to_string())
    }

    fn style(&self) -> Result<String> {
        if let Some(style) = self.header.find_scalar(STYLE_PATH) {
            return Ok(style.to_string());
        }

        // Link left in place: look the style up in the shared pool directly
        let link = format!("{}.{}", STYLE_LINK_PATH, LINK_MARKER);
        if let (Some(index), Some(shared)) = (self.header.find_scalar(&link), &self.shared) {
            let path = format!("{}.{}.settings.style", SHARED_STYLE_POOL, index);
            return Ok(shared.scalar(&path)?.to_string());
        }

        Err(JpkError::MissingParameter(STYLE_PATH.to_string()))
    }
}

/// `num_points` evenly spaced stamps in `[0, duration)`
fn time_base(duration: f64, num_points: usize) -> Vec<f64> {
    if num_points == 0 {
        return Vec::new();
    }
    let step = duration / num_points as f64;
    (0..num_points).map(|i| i as f64 * step).collect()
}
