//! Utility functions for paths and size formatting.

pub mod format;
pub mod paths;
pub mod time;
