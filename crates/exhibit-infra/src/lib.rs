//! Exhibit infrastructure
//!
//! Process-wide setup shared by binaries: tracing subscriber initialisation.

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry};
