use std::io::{Read, Seek};
use std::path::PathBuf;

use anyhow::Result;
use zip::ZipArchive;

/// Anything that can hand out the files of one feed. The readers don't care whether they come
/// from a directory, an archive, or somewhere else.
pub trait FeedSource {
    /// Returns `None` if the feed doesn't have this file.
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>>;
}

/// A feed extracted into a directory
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl FeedSource for DirSource {
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>> {
        let path = self.root.join(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Box::new(fs_err::File::open(path)?)))
    }
}

/// A zipped feed. Files may sit at the top level or inside one directory (like `gtfs/`).
pub struct ZipSource<R> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }

    fn resolve(&self, name: &str) -> Option<String> {
        let suffix = format!("/{name}");
        let mut nested = None;
        for path in self.archive.file_names() {
            if path == name {
                return Some(path.to_string());
            }
            if nested.is_none() && path.ends_with(&suffix) {
                nested = Some(path.to_string());
            }
        }
        nested
    }
}

impl ZipSource<fs_err::File> {
    pub fn open_path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        Self::new(fs_err::File::open(path.into())?)
    }
}

impl<R: Read + Seek> FeedSource for ZipSource<R> {
    fn open(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>> {
        let path = match self.resolve(name) {
            Some(path) => path,
            None => return Ok(None),
        };
        let file = self
            .archive
            .by_name(&path)
            .map_err(|err| anyhow!("{path}: {err}"))?;
        Ok(Some(Box::new(file)))
    }
}
