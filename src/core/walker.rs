//! Directory traversal feeding candidate files to the per-file policy.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::detector::{ChardetClassifier, Classifier, Detector};
use super::policy::{classify_file, FileReport, RunSummary, SharedSummary};
use super::transcoder::Transcoder;
use crate::config::Config;
use crate::utils::file_helper;

/// Receives one report per processed file.
pub trait ReportSink: Send + Sync {
    fn report(&self, report: &FileReport);
}

impl<F> ReportSink for F
where
    F: Fn(&FileReport) + Send + Sync,
{
    fn report(&self, report: &FileReport) {
        self(report)
    }
}

/// Walks a directory tree and converts every matching file.
pub struct Walker<C = ChardetClassifier> {
    detector: Detector<C>,
    transcoder: Transcoder,
    config: Config,
    extensions: HashSet<String>,
    cancel: Arc<AtomicBool>,
}

impl Walker<ChardetClassifier> {
    pub fn new(config: Config, transcoder: Transcoder) -> Self {
        Self::with_detector(Detector::new(), transcoder, config)
    }
}

impl<C: Classifier> Walker<C> {
    pub fn with_detector(detector: Detector<C>, transcoder: Transcoder, config: Config) -> Self {
        let extensions = config.extension_set();
        Self {
            detector,
            transcoder,
            config,
            extensions,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting this flag stops the walk before the next file.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Process every candidate under `root`, reporting each file to `sink`.
    ///
    /// A failing file never stops the walk.
    pub fn run(&self, root: &Path, sink: &dyn ReportSink) -> RunSummary {
        info!("scanning folder: {}", root.display());
        if self.transcoder.is_dry_run() {
            info!("dry run: no file will be modified");
        }

        let summary = if self.config.jobs > 1 {
            self.run_parallel(root, sink)
        } else {
            self.run_sequential(root, sink)
        };

        if self.is_cancelled() {
            warn!("scan cancelled after {} files", summary.processed);
        }
        info!("{}", summary);
        summary
    }

    fn run_sequential(&self, root: &Path, sink: &dyn ReportSink) -> RunSummary {
        let mut summary = RunSummary::default();
        for candidate in self.candidates(root) {
            if self.is_cancelled() {
                break;
            }
            let report = self.process(candidate);
            summary.record(&report);
            sink.report(&report);
        }
        summary
    }

    fn run_parallel(&self, root: &Path, sink: &dyn ReportSink) -> RunSummary {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("failed to start {} workers, running sequentially: {}", self.config.jobs, e);
                return self.run_sequential(root, sink);
            }
        };

        let candidates: Vec<_> = self.candidates(root).collect();
        let summary = SharedSummary::default();

        pool.install(|| {
            candidates.into_par_iter().for_each(|candidate| {
                if self.is_cancelled() {
                    return;
                }
                let report = self.process(candidate);
                summary.record(&report);
                sink.report(&report);
            });
        });

        summary.snapshot()
    }

    fn process(&self, candidate: Result<PathBuf, FileReport>) -> FileReport {
        match candidate {
            Ok(path) => {
                debug!("processing {}", path.display());
                classify_file(&path, &self.detector, &self.transcoder, &self.config)
            }
            Err(report) => report,
        }
    }

    /// Regular files with an allowed extension; unreadable entries become
    /// error reports.
    fn candidates<'a>(
        &'a self,
        root: &'a Path,
    ) -> impl Iterator<Item = Result<PathBuf, FileReport>> + 'a {
        WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    let wanted = entry.file_type().is_file()
                        && file_helper::has_extension(entry.path(), &self.extensions);
                    wanted.then(|| Ok(entry.into_path()))
                }
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    warn!("cannot read {}: {}", path.display(), e);
                    Some(Err(FileReport::error(
                        &path,
                        format!("failed to read directory entry: {}", e),
                    )))
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::ReportStatus;
    use std::fs;
    use std::sync::Mutex;

    const CHINESE: &str = "你好世界！这是一个中文文本文件，用于测试编码转换工具是否能够正确识别简体中文内容。\
        我们在这里写下足够多的汉字，让统计检测有充分的依据来判断编码。";

    fn gbk(text: &str) -> Vec<u8> {
        encoding_rs::GBK.encode(text).0.into_owned()
    }

    /// gbk.txt, plain.txt, empty.log, nested/notes.md, image.png
    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("gbk.txt"), gbk(CHINESE)).unwrap();
        fs::write(root.join("plain.txt"), "hello").unwrap();
        fs::write(root.join("empty.log"), b"").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("notes.md"), gbk(CHINESE)).unwrap();
        fs::write(root.join("image.png"), gbk(CHINESE)).unwrap();
        dir
    }

    fn walk(root: &Path, config: Config) -> (RunSummary, Vec<FileReport>) {
        let reports = Mutex::new(Vec::new());
        let sink = |report: &FileReport| reports.lock().unwrap().push(report.clone());
        let summary = Walker::new(config, Transcoder::new()).run(root, &sink);
        (summary, reports.into_inner().unwrap())
    }

    #[test]
    fn test_converts_tree_and_second_run_skips() {
        let dir = fixture();
        let root = dir.path();

        let (summary, reports) = walk(root, Config::default());
        assert_eq!(
            summary,
            RunSummary {
                processed: 4,
                converted: 2,
                skipped: 2,
                failed: 1,
            }
        );
        assert_eq!(reports.len(), 4);
        assert_eq!(fs::read_to_string(root.join("nested").join("notes.md")).unwrap(), CHINESE);
        // Not in the allow-list
        assert_eq!(fs::read(root.join("image.png")).unwrap(), gbk(CHINESE));

        let (summary, _) = walk(root, Config::default());
        assert_eq!(
            summary,
            RunSummary {
                processed: 4,
                converted: 0,
                skipped: 4,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_parallel_run_matches_sequential_totals() {
        let dir = fixture();
        let config = Config {
            jobs: 3,
            ..Config::default()
        };

        let (summary, reports) = walk(dir.path(), config);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.converted, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            reports.iter().filter(|r| r.status == ReportStatus::Success).count(),
            2
        );
    }

    #[test]
    fn test_extension_override() {
        let dir = fixture();
        let mut config = Config::default();
        config.set_extensions(["png"]);

        let (summary, reports) = walk(dir.path(), config);
        assert_eq!(summary.processed, 1);
        assert_eq!(reports[0].path, dir.path().join("image.png"));
        assert_eq!(fs::read_to_string(dir.path().join("image.png")).unwrap(), CHINESE);
        assert_eq!(fs::read(dir.path().join("gbk.txt")).unwrap(), gbk(CHINESE));
    }

    #[test]
    fn test_cancelled_walk_processes_nothing() {
        let dir = fixture();
        let walker = Walker::new(Config::default(), Transcoder::new());
        walker.cancel_flag().store(true, Ordering::Relaxed);

        let sink = |_: &FileReport| panic!("no file should be reported");
        let summary = walker.run(dir.path(), &sink);
        assert_eq!(summary, RunSummary::default());
        assert_eq!(fs::read(dir.path().join("gbk.txt")).unwrap(), gbk(CHINESE));
    }

    #[test]
    fn test_cancel_during_walk_finishes_current_file_only() {
        let dir = fixture();
        let walker = Walker::new(Config::default(), Transcoder::new());
        let cancel = walker.cancel_flag();

        let reports = Mutex::new(Vec::new());
        let sink = |report: &FileReport| {
            reports.lock().unwrap().push(report.clone());
            cancel.store(true, Ordering::Relaxed);
        };
        let summary = walker.run(dir.path(), &sink);

        assert_eq!(summary.processed, 1);
        assert_eq!(reports.into_inner().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_root_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (summary, reports) = walk(&dir.path().join("absent"), Config::default());
        assert_eq!(summary.failed, 1);
        assert_eq!(reports[0].status, ReportStatus::Error);
    }
}
