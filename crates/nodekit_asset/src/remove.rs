//! File removal seam

use std::io;
use std::path::Path;

pub trait Remover: Send + Sync {
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// Removes through `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdRemover;

impl Remover for StdRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }
}
