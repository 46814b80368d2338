//! Read-only asset sources
//!
//! Paths are `/`-separated and relative to the bundle root. Listing a file,
//! or a path that does not exist, yields no children.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

pub trait AssetSource: Send + Sync {
    /// Names of the direct children of `path`.
    fn list(&self, path: &str) -> io::Result<Vec<String>>;

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>>;
}

/// Assets stored in a directory on disk.
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl AssetSource for DirAssets {
    fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let full = self.resolve(path);
        if !full.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = std::fs::read_dir(&full)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        let file = std::fs::File::open(self.resolve(path))?;
        Ok(Box::new(file))
    }
}

/// Assets held in memory, keyed by full path.
#[derive(Default)]
pub struct MemoryAssets {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .insert(path.trim_matches('/').to_string(), contents.into());
    }

    pub fn with(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Every leaf file under `root`, relative to it.
    pub fn files_under(&self, root: &str) -> BTreeSet<String> {
        let prefix = format!("{}/", root.trim_matches('/'));
        self.files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(str::to_string)
            .collect()
    }
}

impl AssetSource for MemoryAssets {
    fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let path = path.trim_matches('/');
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        let children: BTreeSet<String> = self
            .files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Ok(children.into_iter().collect())
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        match self.files.get(path.trim_matches('/')) {
            Some(contents) => Ok(Box::new(Cursor::new(contents.as_slice()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no asset at {path}"),
            )),
        }
    }
}
