//! Utility functions for terminal output formatting.

pub mod format;

pub use format::{format_date, format_optional, truncate_string};
