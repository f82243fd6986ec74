//! Header timestamp comment
//!
//! The first line of every property file is a comment such as
//! `#Thu Mar 31 14:28:58 CEST 2016`. Parsing is best effort: a known zone
//! abbreviation yields a UTC instant, an unknown one a naive local time, and
//! anything unreadable is kept verbatim. None of these abort header parsing.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use std::fmt;

const UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC%z";
const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Zone abbreviations seen in instrument headers, with their UTC offset in hours
const ZONE_OFFSETS: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("Z", 0),
    ("WET", 0),
    ("WEST", 1),
    ("BST", 1),
    ("CET", 1),
    ("CEST", 2),
    ("EET", 2),
    ("EEST", 3),
    ("MSK", 3),
    ("HKT", 8),
    ("SGT", 8),
    ("JST", 9),
    ("KST", 9),
    ("AEST", 10),
    ("AEDT", 11),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
];

/// Timestamp recovered from a header comment line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderDate {
    /// Zone was known (or explicit), localized to UTC
    Utc(DateTime<Utc>),
    /// Date and time parsed, zone unknown or absent
    Naive(NaiveDateTime),
    /// Text could not be read as a date
    Unparsed(String),
}

impl HeaderDate {
    /// Parse the text following the `#` comment marker
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if let Some(date) = Self::parse_java_style(text) {
            return date;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return HeaderDate::Utc(dt.with_timezone(&Utc));
        }
        for format in [UTC_FORMAT, "%Y-%m-%d %H:%M:%S %z"] {
            if let Ok(dt) = DateTime::parse_from_str(text, format) {
                return HeaderDate::Utc(dt.with_timezone(&Utc));
            }
        }
        for format in [NAIVE_FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%d.%m.%Y %H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return HeaderDate::Naive(dt);
            }
        }
        HeaderDate::Unparsed(text.to_string())
    }

    /// `EEE MMM dd HH:mm:ss zzz yyyy`, as written by `java.util.Date`
    fn parse_java_style(text: &str) -> Option<Self> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.len() != 6 {
            return None;
        }
        let zone = parts[4];
        let without_zone = format!(
            "{} {} {} {} {}",
            parts[0], parts[1], parts[2], parts[3], parts[5]
        );
        let naive = NaiveDateTime::parse_from_str(&without_zone, "%a %b %d %H:%M:%S %Y").ok()?;

        let localized = ZONE_OFFSETS
            .iter()
            .find(|(name, _)| *name == zone)
            .and_then(|(_, hours)| FixedOffset::east_opt(hours * 3600))
            .and_then(|offset| offset.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc));

        Some(match localized {
            Some(utc) => HeaderDate::Utc(utc),
            None => HeaderDate::Naive(naive),
        })
    }

    pub fn is_parsed(&self) -> bool {
        !matches!(self, HeaderDate::Unparsed(_))
    }
}

impl fmt::Display for HeaderDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeaderDate::Utc(dt) => write!(f, "{}", dt.format(UTC_FORMAT)),
            HeaderDate::Naive(dt) => write!(f, "{}", dt.format(NAIVE_FORMAT)),
            HeaderDate::Unparsed(text) => f.write_str(text),
        }
    }
}
