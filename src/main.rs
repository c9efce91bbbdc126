//! gbk2utf8: convert GB2312/GBK text files under a folder to UTF-8.

mod app;
mod config;
mod core;
mod utils;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::config::ConfigManager;
use crate::core::policy::{FileReport, ReportStatus};

#[derive(Parser)]
#[command(name = "gbk2utf8")]
#[command(version)]
#[command(about = "Convert GB2312/GBK encoded text files to UTF-8 in place", long_about = None)]
struct Cli {
    /// Folder to scan recursively
    folder: PathBuf,

    /// Extensions to scan instead of the built-in list (e.g. "txt,md")
    #[arg(short, long = "ext", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Detect and report without rewriting any file
    #[arg(long)]
    dry_run: bool,

    /// Number of files processed in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Bytes sampled from each file for detection
    #[arg(long)]
    sample_size: Option<usize>,

    /// Configuration file (defaults to gbk2utf8_config.json beside the executable)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Save the effective configuration to the config file
    #[arg(long)]
    write_config: bool,

    /// Print per-file reports and the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    let mut config = manager.load()?;

    if !cli.extensions.is_empty() {
        config.set_extensions(&cli.extensions);
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs.max(1);
    }
    if let Some(sample_size) = cli.sample_size {
        config.sample_size = sample_size.max(1);
    }

    if cli.write_config {
        manager.save(&config)?;
        info!("saved config to {}", manager.get_config_file_path().display());
    }

    let handle = crate::app::spawn_run(cli.folder.clone(), config, cli.dry_run)
        .with_context(|| format!("cannot scan {}", cli.folder.display()))?;

    if let Err(e) = ctrlc::set_handler(handle.canceller()) {
        warn!("Ctrl-C will not stop the scan: {}", e);
    }

    for report in handle.reports.iter() {
        if cli.json {
            if let Some(line) = json_line(&report) {
                println!("{}", line);
            }
            continue;
        }
        match report.status {
            ReportStatus::Success => println!("{}", report),
            ReportStatus::Skipped => info!("{}", report),
            ReportStatus::Error | ReportStatus::Undetermined => warn!("{}", report),
        }
    }

    let summary = handle.join()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!("Done. Scanned {} text/code files.", summary.processed);
        println!("  converted: {}", summary.converted);
        println!("  skipped:   {}", summary.skipped);
        println!("  failed:    {}", summary.failed);
    }

    Ok(())
}

/// One JSON event per report. A report that cannot be serialized (a path
/// that is not valid UTF-8) is logged and left out; the scan goes on.
fn json_line(report: &FileReport) -> Option<String> {
    match serde_json::to_string(report) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!("cannot serialize report for {}: {}", report.path.display(), e);
            None
        }
    }
}
