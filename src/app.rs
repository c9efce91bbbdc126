//! Background conversion run.
//!
//! The walk happens on its own thread; every per-file report is sent back
//! over a channel so the caller can render progress while the scan runs.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::anyhow;

use crate::config::{Config, ConfigError};
use crate::core::policy::{FileReport, RunSummary};
use crate::core::transcoder::Transcoder;
use crate::core::walker::{ReportSink, Walker};
use crate::utils::file_helper;

/// Forwards reports to the foreground.
struct ChannelSink {
    sender: Sender<FileReport>,
}

impl ReportSink for ChannelSink {
    fn report(&self, report: &FileReport) {
        // The receiver going away only means nobody is watching any more.
        let _ = self.sender.send(report.clone());
    }
}

/// Handle on a running conversion.
pub struct RunHandle {
    pub reports: Receiver<FileReport>,
    cancel: Arc<AtomicBool>,
    worker: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Trigger that stops the walk after the file currently in progress.
    /// Detached from the handle so it can live in a signal handler.
    pub fn canceller(&self) -> impl Fn() + Send + 'static {
        let cancel = Arc::clone(&self.cancel);
        move || cancel.store(true, Ordering::Relaxed)
    }

    /// Wait for the walk to finish and return its totals.
    pub fn join(self) -> anyhow::Result<RunSummary> {
        self.worker
            .join()
            .map_err(|_| anyhow!("conversion thread panicked"))
    }
}

/// Validate `root` and start converting it in the background.
pub fn spawn_run(root: PathBuf, config: Config, dry_run: bool) -> Result<RunHandle, ConfigError> {
    if !file_helper::directory_exists(&root) {
        return Err(ConfigError::InvalidRoot(root));
    }

    let transcoder = if dry_run {
        Transcoder::dry_run()
    } else {
        Transcoder::new()
    };
    let walker = Walker::new(config, transcoder);
    let cancel = walker.cancel_flag();
    let (sender, reports) = mpsc::channel();

    let worker = thread::spawn(move || {
        let sink = ChannelSink { sender };
        walker.run(&root, &sink)
    });

    Ok(RunHandle {
        reports,
        cancel,
        worker,
    })
}
