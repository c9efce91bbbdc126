//! Rewrites legacy-encoded files as UTF-8.
//!
//! The whole file is read once. The lossy source decode and the strict UTF-8
//! check both run on that buffer, and a rewrite only happens when the two
//! disagree.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::utils::{encoding, file_helper};

/// Name of the encoding every converted file ends up in.
pub const TARGET_ENCODING: &str = "utf-8";

/// Result of one transcode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Converted,
    Skipped,
    Failed(String),
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionOutcome::Converted => write!(f, "converted"),
            ConversionOutcome::Skipped => write!(f, "skipped"),
            ConversionOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Errors that can occur while converting a file.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The file could not be read
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source label is not a codec encoding_rs knows
    #[error("unsupported encoding '{label}' for '{path}'")]
    UnsupportedEncoding { path: PathBuf, label: String },

    /// The replacement could not be written; the original is untouched
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a successful pass decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    AlreadyTarget,
    Rewritten,
}

/// Converts single files to UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transcoder {
    dry_run: bool,
}

impl Transcoder {
    pub fn new() -> Self {
        Self { dry_run: false }
    }

    /// Take every decision but never write.
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Convert `path` from `source_label` to UTF-8 if it is not already
    /// equivalent UTF-8 text.
    pub fn transcode(&self, path: &Path, source_label: &str) -> ConversionOutcome {
        match self.try_transcode(path, source_label) {
            Ok(Decision::Rewritten) => ConversionOutcome::Converted,
            Ok(Decision::AlreadyTarget) => ConversionOutcome::Skipped,
            Err(e) => {
                warn!("{}", e);
                ConversionOutcome::Failed(e.to_string())
            }
        }
    }

    fn try_transcode(&self, path: &Path, source_label: &str) -> Result<Decision, ConversionError> {
        let codec = encoding::resolve(source_label).ok_or_else(|| {
            ConversionError::UnsupportedEncoding {
                path: path.to_path_buf(),
                label: source_label.to_string(),
            }
        })?;

        let raw = fs::read(path).map_err(|source| ConversionError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let (text, had_errors) = encoding::decode_lossy(&raw, codec);
        if had_errors {
            debug!(
                "{}: malformed {} sequences replaced with U+FFFD",
                path.display(),
                codec.name()
            );
        }

        if encoding::decode_utf8_strict(&raw) == Some(text.as_str()) {
            return Ok(Decision::AlreadyTarget);
        }

        if self.dry_run {
            debug!("dry run, not writing {}", path.display());
            return Ok(Decision::Rewritten);
        }

        file_helper::write_atomic(path, text.as_bytes()).map_err(|source| {
            ConversionError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Decision::Rewritten)
    }
}
