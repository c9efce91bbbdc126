//! Per-file decision: detect, then convert only legacy Chinese files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Serialize, Serializer};
use tracing::{debug, info};

use super::detector::{Classifier, Detector};
use super::transcoder::{ConversionOutcome, Transcoder, TARGET_ENCODING};
use crate::config::Config;
use crate::utils::file_helper;

/// Status of one reported file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Success,
    Skipped,
    Error,
    /// Encoding could not be determined; tallied as skipped and failed.
    Undetermined,
}

impl ReportStatus {
    /// Event label handed to the caller.
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Success => "success",
            ReportStatus::Skipped => "skipped",
            ReportStatus::Error | ReportStatus::Undetermined => "error",
        }
    }
}

/// One per-file event: `(path, status, detail)`.
///
/// `detail` is the source encoding on success, otherwise the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(serialize_with = "serialize_status_label")]
    pub status: ReportStatus,
    pub detail: String,
}

/// Events only ever carry `success`, `skipped` or `error`.
fn serialize_status_label<S: Serializer>(status: &ReportStatus, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(status.label())
}

impl FileReport {
    fn new(path: &Path, status: ReportStatus, detail: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            status,
            detail: detail.into(),
        }
    }

    pub fn error(path: &Path, detail: impl Into<String>) -> Self {
        Self::new(path, ReportStatus::Error, detail)
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            ReportStatus::Success => write!(
                f,
                "success: {} ({} -> {})",
                self.path.display(),
                self.detail,
                TARGET_ENCODING
            ),
            _ => write!(f, "{}: {} ({})", self.status.label(), self.path.display(), self.detail),
        }
    }
}

/// Counters for one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: &FileReport) {
        self.processed += 1;
        match report.status {
            ReportStatus::Success => self.converted += 1,
            ReportStatus::Skipped => self.skipped += 1,
            ReportStatus::Error => self.failed += 1,
            ReportStatus::Undetermined => {
                self.skipped += 1;
                self.failed += 1;
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} files: {} converted, {} skipped, {} failed",
            self.processed, self.converted, self.skipped, self.failed
        )
    }
}

/// [`RunSummary`] counters safe to bump from several workers.
#[derive(Debug, Default)]
pub struct SharedSummary {
    processed: AtomicUsize,
    converted: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl SharedSummary {
    pub fn record(&self, report: &FileReport) {
        let mut delta = RunSummary::default();
        delta.record(report);
        self.processed.fetch_add(delta.processed, Ordering::Relaxed);
        self.converted.fetch_add(delta.converted, Ordering::Relaxed);
        self.skipped.fetch_add(delta.skipped, Ordering::Relaxed);
        self.failed.fetch_add(delta.failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            processed: self.processed.load(Ordering::Relaxed),
            converted: self.converted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Detect one candidate file and convert it when it is legacy-encoded.
pub fn classify_file<C: Classifier>(
    path: &Path,
    detector: &Detector<C>,
    transcoder: &Transcoder,
    config: &Config,
) -> FileReport {
    let sample = match file_helper::read_sample(path, config.sample_size) {
        Ok(sample) => sample,
        Err(e) => {
            return FileReport::new(
                path,
                ReportStatus::Undetermined,
                format!("failed to read sample: {}", e),
            );
        }
    };

    let detection = detector.detect(&sample);
    let Some(label) = detection.encoding.as_deref() else {
        debug!("unable to detect encoding: {}", path.display());
        return FileReport::new(path, ReportStatus::Undetermined, "unable to detect encoding");
    };

    if !detection.is_supported(&config.supported_encodings) {
        debug!("skipping {} ({})", path.display(), label);
        return FileReport::new(
            path,
            ReportStatus::Skipped,
            format!("{} is not a conversion target", label),
        );
    }

    info!(
        "detected {} (confidence {:.2}): {}",
        label.to_uppercase(),
        detection.confidence,
        file_helper::display_name(path)
    );

    match transcoder.transcode(path, label) {
        ConversionOutcome::Converted => FileReport::new(path, ReportStatus::Success, label),
        ConversionOutcome::Skipped => FileReport::new(
            path,
            ReportStatus::Skipped,
            format!("already {} or no conversion needed", TARGET_ENCODING),
        ),
        ConversionOutcome::Failed(reason) => FileReport::error(path, reason),
    }
}
