//! Formatting helpers shared by the library and the TUI.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_compact, format_hms, parse_compact};
