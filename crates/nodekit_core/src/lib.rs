//! Nodekit Core
//!
//! Shared plumbing for the host application:
//! - UI event queue (single consumer, bounded)
//! - Callback handles handed to the embedded runtime
//! - Backpressure policy for fast producers

pub mod ui;

pub use ui::{Backpressure, CallbackHandle, Delivery, UiHandle, UiLoop};

/// Host version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
