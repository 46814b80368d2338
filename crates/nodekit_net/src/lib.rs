//! Nodekit Network Layer
//!
//! Loopback requests against the HTTP server started by the embedded runtime.

pub mod probe;

pub use probe::{LoopbackProbe, ProbeError};
