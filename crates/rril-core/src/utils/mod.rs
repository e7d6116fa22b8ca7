//! Utility functions for display formatting.

pub mod format;

pub use format::{mask_token, truncate_string};
