//! Non-fatal diagnostics
//!
//! Missing-but-optional metadata never aborts a load or a decode. Instead a
//! [`Warning`] is logged through `tracing` and handed to a caller-supplied
//! [`WarningSink`], so callers can inspect (or assert on) what was degraded.

use std::fmt;
use tracing::warn;

/// A degraded-but-recoverable condition met while reading an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Member under a top-level folder the reader does not know; skipped
    ForeignEntry { path: String },
    /// Channel has no encoder parameters; raw values stay digital
    MissingEncoder { channel: String },
    /// Channel has no conversion-set; only the encoder step is applied
    MissingConversionSet { channel: String },
    /// Default conversion table has no (or an empty) chain for the channel
    NoDefaultConversion { channel: String },
    /// Flat index used on a grid-patterned map
    GridIndexBypassed { index: usize },
    /// Segment numbers are not dense from zero
    SegmentGap { missing: usize },
    /// Segment header still holds `*` links but the archive has no shared header
    UnresolvedLinks { segment: usize, links: usize },
    /// Requested channel is absent from a segment
    ChannelNotInAllSegments { channel: String, segment: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::ForeignEntry { path } => {
                write!(f, "unrecognized archive member '{}', skipped", path)
            }
            Warning::MissingEncoder { channel } => {
                write!(f, "no encoder parameters for channel '{}'", channel)
            }
            Warning::MissingConversionSet { channel } => {
                write!(f, "no conversion parameters for channel '{}'", channel)
            }
            Warning::NoDefaultConversion { channel } => write!(
                f,
                "no default conversion chain for channel '{}', keeping encoder unit",
                channel
            ),
            Warning::GridIndexBypassed { index } => write!(
                f,
                "map uses a grid pattern, flat index {} bypasses grid coordinates",
                index
            ),
            Warning::SegmentGap { missing } => {
                write!(f, "segment {} is missing from the archive", missing)
            }
            Warning::UnresolvedLinks { segment, links } => write!(
                f,
                "segment {} has {} shared-data link(s) but no shared header",
                segment, links
            ),
            Warning::ChannelNotInAllSegments { channel, segment } => {
                write!(f, "channel '{}' not present in segment {}", channel, segment)
            }
        }
    }
}

/// Receiver for non-fatal warnings
pub trait WarningSink {
    fn warn(&mut self, warning: Warning);
}

impl<F: FnMut(Warning)> WarningSink for F {
    fn warn(&mut self, warning: Warning) {
        self(warning)
    }
}

/// Sink that only logs; the warning itself is dropped
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&mut self, _warning: Warning) {}
}

/// Sink that keeps every warning in arrival order
#[derive(Debug, Default, Clone)]
pub struct WarningCollector {
    warnings: Vec<Warning>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_inner(self) -> Vec<Warning> {
        self.warnings
    }
}

impl WarningSink for WarningCollector {
    fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }
}

/// Log a warning and forward it to the sink
pub(crate) fn emit(sink: &mut dyn WarningSink, warning: Warning) {
    warn!("{}", warning);
    sink.warn(warning);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_keeps_order() {
        let mut collector = WarningCollector::new();
        emit(
            &mut collector,
            Warning::ForeignEntry {
                path: "thumbnails/a.png".to_string(),
            },
        );
        emit(&mut collector, Warning::SegmentGap { missing: 1 });

        assert_eq!(collector.warnings().len(), 2);
        assert!(matches!(
            collector.warnings()[0],
            Warning::ForeignEntry { .. }
        ));
        assert_eq!(collector.warnings()[1], Warning::SegmentGap { missing: 1 });
    }

    #[test]
    fn test_closure_sink() {
        let mut count = 0;
        {
            let mut sink = |_w: Warning| count += 1;
            emit(&mut sink, Warning::GridIndexBypassed { index: 4 });
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_display_names_channel() {
        let w = Warning::MissingEncoder {
            channel: "vDeflection".to_string(),
        };
        assert!(w.to_string().contains("vDeflection"));
    }
}
