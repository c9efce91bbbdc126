//! Utility modules for file I/O and text encoding.

pub mod encoding;
pub mod file_helper;
