//! Shared helpers for integration tests.
//!
//! - `fixtures`: mock provider servers and config files
//! - `logger`: per-test structured logging
//! - `log_capture`: assertions on `tracing` output

pub mod fixtures;
pub mod log_capture;
pub mod logger;
