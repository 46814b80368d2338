//! Nodekit Scripting System
//!
//! JavaScript execution via QuickJS.
//!
//! ## Architecture
//!
//! - **Bridge:** [`NativeRuntime`] is the only surface the host calls;
//!   [`RuntimeBridge`] guarantees a single start.
//! - **Embedded runtime:** [`EmbeddedNode`] runs a node-style entry script
//!   with `console`, `$log`, `$toast`, `sleep`, timers and `process`
//!   available.
//! - **Ad-hoc evaluation:** [`ScriptRuntime`] evaluates snippets and copies
//!   results out, resolving Promises on demand.

pub mod bridge;
pub mod embedded;
pub mod error;
pub mod ffi;
pub mod runtime;

pub use bridge::{NativeRuntime, RuntimeBridge, StartClaim, StartOutcome, StartState};
pub use embedded::{EmbeddedConfig, EmbeddedNode};
pub use error::{Result, ScriptError};
pub use runtime::{EvalResult, PendingPromise, ScriptRuntime};

pub use rquickjs;
