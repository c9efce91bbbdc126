//! Encoding detection for a bounded file prefix.
//!
//! A statistical [`Classifier`] produces a raw `(label, confidence)` guess;
//! [`Detector`] then canonicalizes legacy Chinese labels and rescues the
//! common cases where GBK text is misread as ASCII or windows-1252.

use chardetng::EncodingDetector;
use tracing::debug;

use crate::utils::encoding;

/// Default number of bytes sampled from each file.
pub const DEFAULT_SAMPLE_SIZE: usize = 4096;

/// Labels treated as the same legacy Chinese signal.
pub const LEGACY_LABELS: [&str; 3] = ["gb2312", "gbk", "gb18030"];

/// Labels that chardet-style detectors commonly report for GBK bytes.
const RESCUE_LABELS: [&str; 2] = ["ascii", "windows-1252"];

/// Below this confidence a rescue label is re-checked as GBK.
const RESCUE_THRESHOLD: f32 = 0.9;

/// Confidence assigned to a rescued GBK guess.
const RESCUE_CONFIDENCE: f32 = 0.5;

/// Immutable prefix of a file's raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSample {
    bytes: Vec<u8>,
    truncated: bool,
}

impl ByteSample {
    /// Build a sample from up to `cap` leading bytes. Anything past the cap
    /// is dropped and marks the sample as truncated.
    pub fn new(mut bytes: Vec<u8>, cap: usize) -> Self {
        let truncated = bytes.len() > cap;
        bytes.truncate(cap);
        Self { bytes, truncated }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the file continues beyond this sample.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Best guess for a sample. `encoding == None` means undeterminable.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub encoding: Option<String>,
    pub confidence: f32,
}

impl DetectionResult {
    pub fn undetermined() -> Self {
        Self {
            encoding: None,
            confidence: 0.0,
        }
    }

    /// True when the label is one of `supported`, compared case-insensitively.
    pub fn is_supported(&self, supported: &[String]) -> bool {
        match &self.encoding {
            Some(label) => supported.iter().any(|s| s.eq_ignore_ascii_case(label)),
            None => false,
        }
    }
}

/// Statistical pass producing a raw `(label, confidence)` guess.
///
/// `last` is false when the bytes are a prefix cut from a longer file, so a
/// multi-byte sequence at the end may be incomplete.
/// Returns `None` when nothing can be said about the bytes.
pub trait Classifier: Send + Sync {
    fn classify(&self, bytes: &[u8], last: bool) -> Option<(String, f32)>;
}

/// Default classifier backed by chardetng.
///
/// chardetng only reports a guess and whether it beat the other candidates,
/// so confidence is coarse: 0.99 for an assessed guess whose strict decode of
/// the bytes succeeds, 0.5 otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChardetClassifier;

impl Classifier for ChardetClassifier {
    fn classify(&self, bytes: &[u8], last: bool) -> Option<(String, f32)> {
        if bytes.is_empty() {
            return None;
        }
        if encoding::is_ascii(bytes) {
            return Some(("ascii".to_string(), 1.0));
        }

        let mut detector = EncodingDetector::new();
        detector.feed(bytes, last);
        let (guess, assessed) = detector.guess_assess(None, true);

        let decodes = encoding::decode_strict(bytes, guess, last).is_some();
        let confidence = if assessed && decodes { 0.99 } else { 0.5 };
        Some((guess.name().to_string(), confidence))
    }
}

/// Canonicalizing wrapper around a [`Classifier`].
#[derive(Debug, Default, Clone)]
pub struct Detector<C = ChardetClassifier> {
    classifier: C,
}

impl Detector<ChardetClassifier> {
    pub fn new() -> Self {
        Self::with_classifier(ChardetClassifier)
    }
}

impl<C: Classifier> Detector<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self { classifier }
    }

    /// Detect the encoding of a sample. Pure function of the sample bytes.
    pub fn detect(&self, sample: &ByteSample) -> DetectionResult {
        let Some((label, confidence)) = self
            .classifier
            .classify(sample.bytes(), !sample.is_truncated())
        else {
            return DetectionResult::undetermined();
        };
        let lower = label.to_ascii_lowercase();

        if LEGACY_LABELS.contains(&lower.as_str()) {
            return DetectionResult {
                encoding: Some(lower),
                confidence,
            };
        }

        if confidence < RESCUE_THRESHOLD
            && RESCUE_LABELS.contains(&lower.as_str())
            && decodes_as_gbk(sample)
        {
            debug!(raw = %label, confidence, "low-confidence guess decodes as GBK");
            return DetectionResult {
                encoding: Some("gbk".to_string()),
                confidence: RESCUE_CONFIDENCE,
            };
        }

        DetectionResult {
            encoding: Some(label),
            confidence,
        }
    }
}

/// Strict GBK check; a truncated sample may end mid-character.
fn decodes_as_gbk(sample: &ByteSample) -> bool {
    encoding::decode_strict(sample.bytes(), encoding_rs::GBK, !sample.is_truncated()).is_some()
}
