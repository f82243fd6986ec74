//! Member sources an archive can be read from
//!
//! [`ArchiveFile`](super::ArchiveFile) only needs to list members and read one
//! member at a time. [`ZipSource`] does that over a real zip container,
//! [`MemorySource`] over bytes already in memory, and [`VirtualSubArchive`]
//! over a prefix-scoped slice of another source, which is how every pixel of a
//! map is read without copying its bytes out of the map container.

use crate::{JpkError, Result};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

/// Capability to enumerate and read archive members
pub trait EntrySource {
    /// Member paths in the container's natural listing order
    fn member_names(&self) -> Vec<String>;

    /// Full contents of one member
    fn read_member(&mut self, name: &str) -> Result<Vec<u8>>;
}

/// Zip container
pub struct ZipSource<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl ZipSource<File> {
    /// Open a zip container from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening archive {}", path.display());
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }
}

impl<R: Read + Seek> EntrySource for ZipSource<R> {
    fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(String::from).collect()
    }

    fn read_member(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => JpkError::MissingMember(name.to_string()),
            other => JpkError::Zip(other),
        })?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// In-memory member list, kept in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    members: Vec<(String, Vec<u8>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member (builder pattern)
    pub fn with_member(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    /// Add or replace a member
    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let data = data.into();
        match self.members.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = data,
            None => self.members.push((name, data)),
        }
    }
}

impl EntrySource for MemorySource {
    fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_member(&mut self, name: &str) -> Result<Vec<u8>> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| JpkError::MissingMember(name.to_string()))
    }
}

/// Prefix-scoped view of a parent source
///
/// Holds the member names relative to `prefix` and forwards every read to the
/// parent as `prefix + name`. Nothing is copied until a member is read.
pub struct VirtualSubArchive<'a, S: EntrySource + ?Sized> {
    parent: &'a mut S,
    members: Vec<String>,
    prefix: String,
}

impl<'a, S: EntrySource + ?Sized> VirtualSubArchive<'a, S> {
    /// `members` must already be stripped of `prefix`
    pub fn new(parent: &'a mut S, members: Vec<String>, prefix: impl Into<String>) -> Self {
        Self {
            parent,
            members,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl<S: EntrySource + ?Sized> EntrySource for VirtualSubArchive<'_, S> {
    fn member_names(&self) -> Vec<String> {
        self.members.clone()
    }

    fn read_member(&mut self, name: &str) -> Result<Vec<u8>> {
        if !self.members.iter().any(|m| m == name) {
            return Err(JpkError::MissingMember(format!("{}{}", self.prefix, name)));
        }
        self.parent.read_member(&format!("{}{}", self.prefix, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_zip_source_lists_in_order() {
        let bytes = zip_bytes(&[
            ("header.properties", &b"#x\na=1\n"[..]),
            ("segments/0/segment-header.properties", &b"#x\n"[..]),
            ("segments/0/channels/height.dat", &[0u8, 1][..]),
        ]);
        let mut source = ZipSource::new(Cursor::new(bytes)).unwrap();

        assert_eq!(source.len(), 3);
        assert_eq!(
            source.member_names(),
            vec![
                "header.properties",
                "segments/0/segment-header.properties",
                "segments/0/channels/height.dat",
            ]
        );
        assert_eq!(
            source.read_member("segments/0/channels/height.dat").unwrap(),
            vec![0, 1]
        );
        assert!(matches!(
            source.read_member("nope"),
            Err(JpkError::MissingMember(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_memory_source_replace() {
        let mut source = MemorySource::new()
            .with_member("a", b"1".to_vec())
            .with_member("b", b"2".to_vec());
        source.insert("a", b"3".to_vec());

        assert_eq!(source.member_names(), vec!["a", "b"]);
        assert_eq!(source.read_member("a").unwrap(), b"3".to_vec());
    }

    #[test]
    fn test_virtual_sub_archive_forwards_with_prefix() {
        let mut parent = MemorySource::new()
            .with_member("index/0/header.properties", b"p0".to_vec())
            .with_member("index/1/header.properties", b"p1".to_vec());

        let mut view = VirtualSubArchive::new(
            &mut parent,
            vec!["header.properties".to_string()],
            "index/1/",
        );

        assert_eq!(view.prefix(), "index/1/");
        assert_eq!(view.member_names(), vec!["header.properties"]);
        assert_eq!(view.read_member("header.properties").unwrap(), b"p1".to_vec());
        assert!(matches!(
            view.read_member("segments/0/segment-header.properties"),
            Err(JpkError::MissingMember(name)) if name.starts_with("index/1/")
        ));
    }
}
