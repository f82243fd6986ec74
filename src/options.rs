//! Load configuration

use crate::decode::ConversionMode;

/// Options controlling how an archive is loaded and decoded
///
/// ```
/// use jpk::{ConversionMode, LoadOptions};
///
/// let options = LoadOptions::default()
///     .with_conversion_mode(ConversionMode::DefaultTable)
///     .with_link_tracing(true);
/// assert!(options.trace_links);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Conversion mode used by `get_channels` when decoding
    pub conversion_mode: ConversionMode,
    /// Log every shared-header merge at debug level
    pub trace_links: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the conversion mode (builder pattern)
    pub fn with_conversion_mode(mut self, mode: ConversionMode) -> Self {
        self.conversion_mode = mode;
        self
    }

    /// Enable or disable link-merge tracing (builder pattern)
    pub fn with_link_tracing(mut self, enabled: bool) -> Self {
        self.trace_links = enabled;
        self
    }
}
