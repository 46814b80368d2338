//! Nodekit Asset Pipeline
//!
//! Deploys the bundled JS project into private storage, once per package update.

pub mod remove;
pub mod source;
pub mod sync;

pub use remove::{Remover, StdRemover};
pub use source::{AssetSource, DirAssets, MemoryAssets};
pub use sync::{AssetSynchronizer, SyncOutcome, SyncReport};
