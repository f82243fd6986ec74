//! Archive member classification
//!
//! The directory layout is the format's API:
//!
//! ```text
//! header.properties
//! shared-data/header.properties
//! segments/<N>/segment-header.properties
//! segments/<N>/channels/<channel>.dat
//! ```
//!
//! Maps nest one such layout per pixel under `index/<I>/`.

/// Top-level header member
pub const TOP_HEADER: &str = "header.properties";
/// Shared parameter pool member
pub const SHARED_HEADER: &str = "shared-data/header.properties";
/// Segment header file name
pub const SEGMENT_HEADER: &str = "segment-header.properties";

const SEGMENTS_DIR: &str = "segments";
const CHANNELS_DIR: &str = "channels";
const SHARED_DIR: &str = "shared-data";
const INDEX_DIR: &str = "index";

/// Semantic role of one member of a single-recording archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    TopHeader,
    SharedHeader,
    SegmentHeader { segment: usize },
    ChannelData { segment: usize, channel: String },
    /// Anything else below `segments/<N>/`; allocates the segment only
    SegmentMember { segment: usize },
    /// Directory placeholders and auxiliary shared data
    Ignored,
    /// Member under a folder this reader does not know
    Foreign,
}

impl EntryKind {
    /// Segment the member belongs to, if any
    pub fn segment(&self) -> Option<usize> {
        match self {
            EntryKind::SegmentHeader { segment }
            | EntryKind::ChannelData { segment, .. }
            | EntryKind::SegmentMember { segment } => Some(*segment),
            _ => None,
        }
    }
}

/// Classify a member path of a single-recording archive
pub fn classify_entry(path: &str) -> EntryKind {
    if path == TOP_HEADER {
        return EntryKind::TopHeader;
    }
    if path == SHARED_HEADER {
        return EntryKind::SharedHeader;
    }

    let parts: Vec<&str> = path.split('/').collect();
    match parts.as_slice() {
        [SEGMENTS_DIR, number, rest @ ..] if !rest.is_empty() => {
            let Ok(segment) = number.parse::<usize>() else {
                return EntryKind::Foreign;
            };
            if matches!(rest, [SEGMENT_HEADER]) {
                EntryKind::SegmentHeader { segment }
            } else if let Some(channel) = channel_name(rest) {
                EntryKind::ChannelData {
                    segment,
                    channel: channel.to_string(),
                }
            } else {
                EntryKind::SegmentMember { segment }
            }
        }
        [SEGMENTS_DIR, ..] | [SHARED_DIR, ..] | [""] => EntryKind::Ignored,
        _ => EntryKind::Foreign,
    }
}

/// `<channel>.dat` or `channels/<channel>.dat`
fn channel_name<'a>(rest: &[&'a str]) -> Option<&'a str> {
    let file = match rest {
        [file] | [CHANNELS_DIR, file] => *file,
        _ => return None,
    };
    file.strip_suffix(".dat").filter(|name| !name.is_empty())
}

/// Semantic role of one member of a map archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEntryKind<'a> {
    TopHeader,
    SharedHeader,
    /// Member of pixel `index`, with the `index/<I>/` prefix stripped
    Pixel { index: usize, member: &'a str },
    Ignored,
    Foreign,
}

/// Classify a member path of a map archive
pub fn classify_map_entry(path: &str) -> MapEntryKind<'_> {
    if path == TOP_HEADER {
        return MapEntryKind::TopHeader;
    }
    if path == SHARED_HEADER {
        return MapEntryKind::SharedHeader;
    }

    let mut parts = path.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(INDEX_DIR), Some(number), Some(member)) => match number.parse::<usize>() {
            Ok(index) if !member.is_empty() => MapEntryKind::Pixel { index, member },
            Ok(_) => MapEntryKind::Ignored,
            Err(_) => MapEntryKind::Foreign,
        },
        (Some(INDEX_DIR), ..) | (Some(SHARED_DIR), ..) | (Some(""), ..) => MapEntryKind::Ignored,
        _ => MapEntryKind::Foreign,
    }
}

/// Prefix scoping pixel `index` inside a map archive
pub fn pixel_prefix(index: usize) -> String {
    format!("{}/{}/", INDEX_DIR, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers() {
        assert_eq!(classify_entry("header.properties"), EntryKind::TopHeader);
        assert_eq!(
            classify_entry("shared-data/header.properties"),
            EntryKind::SharedHeader
        );
        assert_eq!(
            classify_entry("segments/3/segment-header.properties"),
            EntryKind::SegmentHeader { segment: 3 }
        );
        // Only at the archive root
        assert_eq!(
            classify_entry("other/header.properties"),
            EntryKind::Foreign
        );
    }

    #[test]
    fn test_channel_data_paths() {
        assert_eq!(
            classify_entry("segments/0/channels/vDeflection.dat"),
            EntryKind::ChannelData {
                segment: 0,
                channel: "vDeflection".to_string()
            }
        );
        assert_eq!(
            classify_entry("segments/12/height.dat"),
            EntryKind::ChannelData {
                segment: 12,
                channel: "height".to_string()
            }
        );
    }

    #[test]
    fn test_other_segment_members_allocate() {
        let kind = classify_entry("segments/1/channels/");
        assert_eq!(kind, EntryKind::SegmentMember { segment: 1 });
        assert_eq!(kind.segment(), Some(1));
        assert_eq!(
            classify_entry("segments/1/"),
            EntryKind::SegmentMember { segment: 1 }
        );
        assert_eq!(
            classify_entry("segments/1/notes.txt"),
            EntryKind::SegmentMember { segment: 1 }
        );
    }

    #[test]
    fn test_ignored_and_foreign() {
        assert_eq!(classify_entry("segments/"), EntryKind::Ignored);
        assert_eq!(classify_entry("segments"), EntryKind::Ignored);
        assert_eq!(classify_entry("shared-data/"), EntryKind::Ignored);
        assert_eq!(classify_entry("thumbnails/preview.png"), EntryKind::Foreign);
        assert_eq!(classify_entry("segments/x/height.dat"), EntryKind::Foreign);
        assert_eq!(classify_entry("readme.txt"), EntryKind::Foreign);
        assert_eq!(classify_entry("readme.txt").segment(), None);
    }

    #[test]
    fn test_map_entries() {
        assert_eq!(classify_map_entry("header.properties"), MapEntryKind::TopHeader);
        assert_eq!(
            classify_map_entry("shared-data/header.properties"),
            MapEntryKind::SharedHeader
        );
        assert_eq!(
            classify_map_entry("index/7/segments/0/channels/height.dat"),
            MapEntryKind::Pixel {
                index: 7,
                member: "segments/0/channels/height.dat"
            }
        );
        assert_eq!(
            classify_map_entry("index/7/header.properties"),
            MapEntryKind::Pixel {
                index: 7,
                member: "header.properties"
            }
        );
        assert_eq!(classify_map_entry("index/7/"), MapEntryKind::Ignored);
        assert_eq!(classify_map_entry("index/"), MapEntryKind::Ignored);
        assert_eq!(classify_map_entry("index/seven/a"), MapEntryKind::Foreign);
        assert_eq!(classify_map_entry("thumbnails/a.png"), MapEntryKind::Foreign);
        assert_eq!(pixel_prefix(7), "index/7/");
    }
}
