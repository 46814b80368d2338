//! Nodekit Services Layer
//!
//! Platform abstraction for settings, private preferences and package metadata.

pub mod error;
pub mod package;
pub mod prefs;
pub mod settings;

pub use error::{Result, ServiceError};
pub use package::{BundleMetadata, PackageMetadata, UNKNOWN_UPDATE_TIME};
pub use prefs::Preferences;
pub use settings::Settings;

/// Name of the private preferences store.
pub const PREFS_NAME: &str = "PREFS";

/// Preferences key holding the last deployed package update time.
pub const LAST_UPDATE_TIME: &str = "LastUpdateTime";
