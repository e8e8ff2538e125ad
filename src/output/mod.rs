//! Output formatting module
//!
//! Provides table and JSON output for reports and interface scans.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
