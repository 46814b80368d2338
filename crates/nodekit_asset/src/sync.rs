//! One-time asset deployment
//!
//! The bundled project is copied into private storage whenever the package
//! update time differs from the stored marker. Failures are logged and
//! aggregated, never propagated: a sync that fails halfway leaves a partial
//! tree behind and does not advance the marker, so the next start retries.

use crate::remove::{Remover, StdRemover};
use crate::source::AssetSource;
use nodekit_services::{PackageMetadata, Preferences, LAST_UPDATE_TIME};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

/// Counters collected while syncing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub removed: usize,
    pub copied: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Marker matches the package; nothing was touched.
    UpToDate,
    Synced { report: SyncReport, update_time: i64 },
    Failed { report: SyncReport },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SyncOutcome::Failed { .. })
    }
}

pub struct AssetSynchronizer {
    source: Box<dyn AssetSource>,
    asset_root: String,
    dest: PathBuf,
    package: Box<dyn PackageMetadata>,
    remover: Box<dyn Remover>,
}

impl AssetSynchronizer {
    /// Mirror `asset_root` of `source` into `dest`.
    pub fn new(
        source: impl AssetSource + 'static,
        asset_root: impl Into<String>,
        dest: impl Into<PathBuf>,
        package: impl PackageMetadata + 'static,
    ) -> Self {
        Self {
            source: Box::new(source),
            asset_root: asset_root.into(),
            dest: dest.into(),
            package: Box::new(package),
            remover: Box::new(StdRemover),
        }
    }

    pub fn with_remover(mut self, remover: impl Remover + 'static) -> Self {
        self.remover = Box::new(remover);
        self
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Whether the stored marker differs from the current package update time.
    pub fn is_stale(&self, prefs: &Preferences) -> bool {
        prefs.get_i64(LAST_UPDATE_TIME, 0) != self.package.current_update_time()
    }

    /// Deploy if stale. `true` when the destination is up to date afterwards.
    pub fn sync(&self, prefs: &mut Preferences) -> bool {
        self.run(prefs).is_success()
    }

    pub fn run(&self, prefs: &mut Preferences) -> SyncOutcome {
        let previous = prefs.get_i64(LAST_UPDATE_TIME, 0);
        let current = self.package.current_update_time();
        if previous == current {
            tracing::debug!(update_time = current, "Assets up to date");
            return SyncOutcome::UpToDate;
        }

        tracing::info!(
            previous,
            current,
            dest = %self.dest.display(),
            "Package updated, redeploying assets"
        );

        let mut report = SyncReport::default();
        if self.dest.symlink_metadata().is_ok() {
            delete_recursively(self.remover.as_ref(), &self.dest, &mut report);
        }
        copy_asset_folder(self.source.as_ref(), &self.asset_root, &self.dest, &mut report);

        if report.failures > 0 {
            tracing::warn!(?report, "Asset sync failed, marker not updated");
            return SyncOutcome::Failed { report };
        }

        if let Err(err) = prefs.edit().put_i64(LAST_UPDATE_TIME, current).apply() {
            tracing::error!(%err, "Cannot persist update marker");
            report.failures += 1;
            return SyncOutcome::Failed { report };
        }

        tracing::info!(copied = report.copied, removed = report.removed, "Assets deployed");
        SyncOutcome::Synced {
            report,
            update_time: current,
        }
    }
}

/// Remove `path` and everything below it. A failure is counted and the
/// walk moves on to the next sibling.
fn delete_recursively(remover: &dyn Remover, path: &Path, report: &mut SyncReport) {
    let is_dir = path
        .symlink_metadata()
        .map(|meta| meta.is_dir())
        .unwrap_or(false);

    if !is_dir {
        match remover.remove_file(path) {
            Ok(()) => report.removed += 1,
            Err(err) => fail(report, path, "remove file", &err),
        }
        return;
    }

    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => return fail(report, path, "list directory", &err),
    };
    for entry in entries {
        match entry {
            Ok(entry) => delete_recursively(remover, &entry.path(), report),
            Err(err) => fail(report, path, "list directory", &err),
        }
    }

    if let Err(err) = remover.remove_dir(path) {
        fail(report, path, "remove directory", &err);
    }
}

/// Copy the asset at `from` to `to`. An asset without children is a leaf file.
fn copy_asset_folder(source: &dyn AssetSource, from: &str, to: &Path, report: &mut SyncReport) {
    let children = match source.list(from) {
        Ok(children) => children,
        Err(err) => return fail(report, to, "list asset", &err),
    };

    if children.is_empty() {
        if let Err(err) = copy_asset(source, from, to) {
            fail(report, to, "copy asset", &err);
        } else {
            report.copied += 1;
        }
        return;
    }

    if let Err(err) = std::fs::create_dir_all(to) {
        return fail(report, to, "create directory", &err);
    }
    for child in children {
        copy_asset_folder(source, &format!("{from}/{child}"), &to.join(&child), report);
    }
}

fn copy_asset(source: &dyn AssetSource, from: &str, to: &Path) -> io::Result<()> {
    let mut input = source.open(from)?;
    let mut output = match OpenOptions::new().write(true).create_new(true).open(to) {
        Ok(file) => file,
        // Already deployed; leave it alone.
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
        Err(err) => return Err(err),
    };
    io::copy(&mut input, &mut output)?;
    output.sync_all()
}

fn fail(report: &mut SyncReport, path: &Path, op: &str, err: &io::Error) {
    report.failures += 1;
    tracing::warn!(path = %path.display(), op, %err, "Asset sync step failed");
}
