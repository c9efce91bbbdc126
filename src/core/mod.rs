//! Detection and conversion engine.

pub mod detector;
pub mod policy;
pub mod transcoder;
pub mod walker;
