//! Property file parser
//!
//! Format, one entry per line:
//!
//! ```text
//! ##optional marker line
//! #Thu Mar 31 14:28:58 CEST 2016
//! force-segment-header.num-points=1000
//! channel.height.data.type=short
//! ```
//!
//! The timestamp comment becomes a synthetic `date` key at the root.

use super::date::HeaderDate;
use super::tree::{ParameterTree, PropertyNode};
use crate::{JpkError, Result};
use tracing::trace;

/// Key under which the header timestamp is stored
pub const DATE_KEY: &str = "date";

/// Parse the lines of one property file into a [`ParameterTree`]
pub fn parse_properties<S: AsRef<str>>(lines: &[S]) -> Result<ParameterTree> {
    let mut tree = ParameterTree::new();

    let mut start = 0;
    if lines
        .first()
        .is_some_and(|line| line.as_ref().starts_with("##"))
    {
        start = 1;
    }

    let Some(date_line) = lines.get(start) else {
        return Ok(tree);
    };
    let date_text = date_line.as_ref().trim();
    let date = HeaderDate::parse(date_text.strip_prefix('#').unwrap_or(date_text));
    if !date.is_parsed() {
        trace!("Header timestamp '{}' kept unparsed", date_text);
    }
    tree.insert(DATE_KEY, PropertyNode::Scalar(date.to_string()));

    for (offset, line) in lines[start + 1..].iter().enumerate() {
        let line = line.as_ref().trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| JpkError::MalformedHeaderLine {
                line: start + 2 + offset,
                content: line.to_string(),
            })?;

        let path: Vec<&str> = key.trim().split('.').collect();
        tree.insert_path(&path, value.trim().to_string())?;
    }

    Ok(tree)
}

/// Parse raw property file bytes (UTF-8, lossy)
pub fn parse_properties_bytes(bytes: &[u8]) -> Result<ParameterTree> {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().collect();
    parse_properties(&lines)
}

impl ParameterTree {
    /// Header timestamp, re-read from the `date` key
    pub fn timestamp(&self) -> Option<HeaderDate> {
        self.find_scalar(DATE_KEY).map(HeaderDate::parse)
    }
}
