//! Terrapulse CLI - submit a change-detection analysis and wait for it.
//!
//! Runs the full service in-process: builds the upstream clients from the
//! environment, submits one request, polls until the task settles, and
//! prints the outcome. Previews can optionally be written to disk instead
//! of being dumped as base64 noise.

use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

use terrapulse::config::{GeminiSettings, SentinelSettings, ServiceSettings};
use terrapulse::geo::{AnalysisKind, AnalysisRequest, BoundingBox};
use terrapulse::logging;
use terrapulse::provider::{ReqwestHttp, SentinelHubProvider};
use terrapulse::service::AnalysisService;
use terrapulse::store::{TaskSnapshot, TaskStatus};
use terrapulse::summary::GeminiSummarizer;

mod error;

use error::CliError;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    /// Vegetation index change between the two dates
    Ndvi,
    /// Water index change between the two dates
    Ndwi,
    /// True-color comparison with a generated summary (needs GOOGLE_API_KEY)
    Truecolor,
}

impl From<KindArg> for AnalysisKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Ndvi => Self::Ndvi,
            KindArg::Ndwi => Self::Ndwi,
            KindArg::Truecolor => Self::TrueColor,
        }
    }
}

#[derive(Parser)]
#[command(name = "terrapulse")]
#[command(version = terrapulse::VERSION)]
#[command(about = "Detect change between two satellite acquisitions", long_about = None)]
struct Args {
    /// Western edge of the area, degrees longitude
    #[arg(long)]
    west: f64,

    /// Southern edge of the area, degrees latitude
    #[arg(long)]
    south: f64,

    /// Eastern edge of the area, degrees longitude
    #[arg(long)]
    east: f64,

    /// Northern edge of the area, degrees latitude
    #[arg(long)]
    north: f64,

    /// Date of the "before" scene (YYYY-MM-DD)
    #[arg(long)]
    from_date: NaiveDate,

    /// Date of the "after" scene (YYYY-MM-DD; equal dates fetch one scene)
    #[arg(long)]
    to_date: NaiveDate,

    /// Analysis to run
    #[arg(long, value_enum, default_value = "ndvi")]
    kind: KindArg,

    /// Number of concurrent workers
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Directory for preview images (omit to skip writing previews)
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Directory for the log file (omit for stdout-only logging)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(error) = run(args).await {
        error.exit();
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let _guard = logging::init_logging(args.log_dir.as_deref())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let kind: AnalysisKind = args.kind.into();
    let sentinel = SentinelSettings::from_env().map_err(CliError::Config)?;
    // The summarizer only speaks for truecolor requests; other kinds run
    // without a key.
    let gemini = match kind {
        AnalysisKind::TrueColor => GeminiSettings::from_env().map_err(CliError::Config)?,
        _ => GeminiSettings::default(),
    };

    let http = ReqwestHttp::new(sentinel.timeout).map_err(CliError::Http)?;
    let imagery = SentinelHubProvider::new(http.clone(), sentinel);
    let summarizer = GeminiSummarizer::new(http, gemini);

    let settings = ServiceSettings {
        worker_count: args.workers,
        ..ServiceSettings::default()
    };
    let service = AnalysisService::new(&settings, imagery, summarizer);

    let bbox = BoundingBox::new(args.west, args.south, args.east, args.north)
        .map_err(CliError::InvalidRequest)?;
    let request = AnalysisRequest {
        bbox,
        from_date: args.from_date,
        to_date: args.to_date,
        kind,
    };

    let task_id = service.submit(request).map_err(CliError::InvalidRequest)?;
    println!("Submitted task {task_id}");

    let snapshot = wait_for_task(&service, task_id, args.timeout_secs).await?;
    let outcome = report(snapshot, args.preview_dir.as_deref());

    service.shutdown().await;
    outcome
}

async fn wait_for_task(
    service: &AnalysisService,
    task_id: terrapulse::store::TaskId,
    timeout_secs: u64,
) -> Result<TaskSnapshot, CliError> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    let mut last_status = None;

    loop {
        let snapshot = service.poll(task_id).expect("own task must be pollable");
        if last_status != Some(snapshot.status) {
            println!("Status: {}", snapshot.status);
            last_status = Some(snapshot.status);
        }
        if snapshot.status.is_terminal() {
            return Ok(snapshot);
        }
        if tokio::time::Instant::now() > deadline {
            return Err(CliError::Timeout(timeout_secs));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// Prints the terminal snapshot and optionally writes previews to disk.
fn report(snapshot: TaskSnapshot, preview_dir: Option<&std::path::Path>) -> Result<(), CliError> {
    match snapshot.status {
        TaskStatus::Completed => {
            let mut result = snapshot.result.expect("completed task carries a result");

            if let Some(dir) = preview_dir {
                for (label, preview) in [
                    ("before", result.preview_from.take()),
                    ("after", result.preview_to.take()),
                ] {
                    if let Some(preview) = preview {
                        let path = write_preview(dir, label, &preview)?;
                        println!("Wrote {path}");
                    }
                }
            } else {
                // Keep the printed JSON readable.
                result.preview_from = None;
                result.preview_to = None;
            }

            let json = serde_json::to_string_pretty(&result)
                .expect("analysis result serializes to JSON");
            println!("{json}");
            Ok(())
        }
        TaskStatus::Failed => Err(CliError::AnalysisFailed(
            snapshot.error.expect("failed task carries an error"),
        )),
        // wait_for_task only returns terminal snapshots.
        other => unreachable!("non-terminal snapshot {other} reported"),
    }
}

/// Decodes one `data:` URL preview and writes it next to its label.
fn write_preview(
    dir: &std::path::Path,
    label: &str,
    data_url: &str,
) -> Result<String, CliError> {
    let (extension, payload) = if let Some(rest) = data_url.strip_prefix("data:image/png;base64,")
    {
        ("png", rest)
    } else if let Some(rest) = data_url.strip_prefix("data:image/jpeg;base64,") {
        ("jpg", rest)
    } else {
        return Err(CliError::FileWrite {
            path: format!("{label} preview"),
            error: std::io::Error::new(std::io::ErrorKind::InvalidData, "unknown preview format"),
        });
    };

    let bytes = BASE64.decode(payload).map_err(|e| CliError::FileWrite {
        path: format!("{label} preview"),
        error: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    let path = dir.join(format!("{label}.{extension}"));
    std::fs::create_dir_all(dir).map_err(|e| CliError::FileWrite {
        path: dir.display().to_string(),
        error: e,
    })?;
    std::fs::write(&path, bytes).map_err(|e| CliError::FileWrite {
        path: path.display().to_string(),
        error: e,
    })?;
    Ok(path.display().to_string())
}
