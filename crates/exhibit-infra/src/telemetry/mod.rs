//! Tracing initialization
//!
//! One subscriber per process, filtered by `RUST_LOG` and written as
//! human-readable lines or JSON depending on `LOG_FORMAT`.

mod init;

pub use init::{init_telemetry, shutdown_telemetry, DEFAULT_FILTER};
