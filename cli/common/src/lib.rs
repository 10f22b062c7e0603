//! Shared utilities for prefixwalk CLI binaries.
//!
//! Argument types, logging setup and number formatting used by the
//! `prefixwalk` binary and the integration tests.

pub mod args;
pub mod format;
pub mod logging;

pub use args::LogLevel;
pub use format::{format_number, format_rate};
pub use logging::init_logging;
