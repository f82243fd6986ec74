//! Calibration of raw channel samples
//!
//! Every channel carries an `encoder` step (digital counts to a base quantity,
//! usually volts) and a `conversion-set` of named steps chained through their
//! `base-calibration-slot`:
//!
//! ```text
//! conversion-set.conversions.base=volts
//! conversion-set.conversions.default=force
//! conversion-set.conversion.distance.base-calibration-slot=volts
//! conversion-set.conversion.force.base-calibration-slot=distance
//! ```
//!
//! Walking back from `default` to `base` gives `[distance, force]`; each step
//! is an affine `value * multiplier + offset` with its own unit.

use crate::diagnostics::{Warning, WarningSink, emit};
use crate::properties::ParameterTree;
use crate::{JpkError, Result};
use tracing::debug;

/// Unit reported for samples no calibration was applied to
pub const DIGITAL_UNIT: &str = "digital";

/// The only scaling style the format is known to use
pub const OFFSET_MULTIPLIER: &str = "offsetmultiplier";

/// Fallback chains per channel name. Empty means known but undetermined.
const DEFAULT_CONVERSION_CHAINS: &[(&str, &[&str])] = &[
    ("height", &["nominal"]),
    ("vDeflection", &["distance", "force"]),
    ("hDeflection", &[]),
    ("strainGaugeHeight", &[]),
    ("error", &[]),
    ("xSignal1", &[]),
];

/// Which conversion steps to apply after the encoder step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConversionMode {
    /// Follow the chain from the header's `default` step back to `base`
    #[default]
    Auto,
    /// Use the built-in per-channel table
    DefaultTable,
    /// Apply exactly these steps, in order
    Explicit(Vec<String>),
}

/// Affine scaling `value * multiplier + offset`, producing `unit`
#[derive(Debug, Clone, PartialEq)]
pub struct Scaling {
    pub multiplier: f64,
    pub offset: f64,
    pub unit: String,
}

impl Scaling {
    /// Read the `scaling.*` block of an encoder or conversion step
    pub fn from_step(step: &ParameterTree) -> Result<Self> {
        let style = step.scalar("scaling.style")?;
        if style != OFFSET_MULTIPLIER {
            return Err(JpkError::UnsupportedConversionStyle {
                style: style.to_string(),
            });
        }

        let unit = step
            .find_scalar("scaling.unit.unit")
            .or_else(|| step.find_scalar("scaling.unit"))
            .ok_or_else(|| JpkError::MissingParameter("scaling.unit.unit".to_string()))?;

        Ok(Self {
            multiplier: step.value("scaling.multiplier")?,
            offset: step.value("scaling.offset")?,
            unit: unit.to_string(),
        })
    }

    pub fn apply(&self, values: &mut [f64]) {
        for value in values.iter_mut() {
            *value = *value * self.multiplier + self.offset;
        }
    }
}

/// Calibrated samples with their physical unit
#[derive(Debug, Clone, PartialEq)]
pub struct Calibrated {
    pub values: Vec<f64>,
    pub unit: String,
}

/// Built-in chain for `channel`, if the table knows one
pub fn default_chain(channel: &str) -> Option<&'static [&'static str]> {
    DEFAULT_CONVERSION_CHAINS
        .iter()
        .find(|(name, _)| *name == channel)
        .map(|(_, chain)| *chain)
}

/// Reconstruct the active conversion steps from a `conversion-set`
///
/// Resolution is pure: the same conversion-set always yields the same list.
pub fn resolve_auto_chain(conversion_set: &ParameterTree) -> Result<Vec<String>> {
    let default = conversion_set.scalar("conversions.default")?;
    let base = conversion_set.scalar("conversions.base")?;

    if default == base {
        return Ok(Vec::new());
    }

    let mut chain = vec![default.to_string()];
    loop {
        let key = &chain[chain.len() - 1];
        let step = conversion_set
            .find_subtree(&format!("conversion.{}", key))
            .ok_or_else(|| JpkError::UnknownConversionStep { step: key.clone() })?;
        let previous = step.scalar("base-calibration-slot")?;

        if previous == base {
            break;
        }
        if chain.iter().any(|seen| seen == previous) {
            return Err(JpkError::ConversionCycle {
                step: previous.to_string(),
            });
        }
        chain.push(previous.to_string());
    }

    chain.reverse();
    Ok(chain)
}

/// Steps to apply for `channel` under `mode`
fn steps_for(
    mode: &ConversionMode,
    channel: &str,
    conversion_set: &ParameterTree,
    sink: &mut dyn WarningSink,
) -> Result<Vec<String>> {
    match mode {
        ConversionMode::Auto => resolve_auto_chain(conversion_set),
        ConversionMode::Explicit(steps) => Ok(steps.clone()),
        ConversionMode::DefaultTable => match default_chain(channel) {
            Some(chain) if !chain.is_empty() => {
                Ok(chain.iter().map(|s| (*s).to_string()).collect())
            }
            _ => {
                emit(
                    sink,
                    Warning::NoDefaultConversion {
                        channel: channel.to_string(),
                    },
                );
                Ok(Vec::new())
            }
        },
    }
}

/// Apply the encoder step, then the conversion chain selected by `mode`
///
/// Missing encoder or conversion parameters degrade the result (warning) rather
/// than failing; a step that is absent, undefined, or of an unknown style fails
/// before any conversion step is applied.
pub fn calibrate(
    channel: &str,
    raw: &[f64],
    encoder: Option<&ParameterTree>,
    conversion_set: Option<&ParameterTree>,
    mode: &ConversionMode,
    sink: &mut dyn WarningSink,
) -> Result<Calibrated> {
    let mut values = raw.to_vec();
    let mut unit = DIGITAL_UNIT.to_string();

    match encoder {
        Some(encoder) => {
            let scaling = Scaling::from_step(encoder)?;
            scaling.apply(&mut values);
            unit = scaling.unit;
        }
        None => emit(
            sink,
            Warning::MissingEncoder {
                channel: channel.to_string(),
            },
        ),
    }

    let Some(conversion_set) = conversion_set else {
        emit(
            sink,
            Warning::MissingConversionSet {
                channel: channel.to_string(),
            },
        );
        return Ok(Calibrated { values, unit });
    };

    let steps = steps_for(mode, channel, conversion_set, sink)?;
    let conversions = conversion_set.subtree("conversion")?;

    let mut scalings = Vec::with_capacity(steps.len());
    for step in &steps {
        let params = conversions
            .find_subtree(step)
            .ok_or_else(|| JpkError::UnknownConversionStep { step: step.clone() })?;
        if params.find_scalar("defined") == Some("false") {
            return Err(JpkError::ConversionStepUndefined { step: step.clone() });
        }
        scalings.push(Scaling::from_step(params)?);
    }

    debug!("Channel '{}': applying conversions {:?}", channel, steps);
    for scaling in scalings {
        scaling.apply(&mut values);
        unit = scaling.unit;
    }

    Ok(Calibrated { values, unit })
}
