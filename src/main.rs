//! # RegWatch
//!
//! Command-line entry point.
//!
//! ## Usage
//!
//! ```sh
//! regwatch run --source BCL --lang en
//! regwatch list --limit 10
//! regwatch schedule --at 10:00
//! regwatch serve --bind 127.0.0.1:8080
//! ```

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use regwatch::cli::{Cli, Command};
use regwatch::config::build_pipeline;
use regwatch::outputs::listing::render_documents;
use regwatch::scheduler::{run_daily, run_once};
use regwatch::server;
use regwatch::utils::ensure_writable_dir;

/// Stderr logging, plus a daily-rotated file when `log_file` is set. The
/// returned guard flushes the file writer on drop.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tfmt::time::UtcTime::rfc_3339());

    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "regwatch.log".to_string());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));
            let file_layer = tfmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_timer(tfmt::time::UtcTime::rfc_3339());
            registry.with(file_layer).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let _log_guard = init_tracing(args.global.log_file.as_deref());

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "regwatch starting up");
    debug!(data_dir = %args.global.data_dir.display(), "Parsed CLI arguments");

    // Early check: the data directories must be writable
    for dir in [args.global.data_dir.clone(), args.global.documents_dir()] {
        if let Err(e) = ensure_writable_dir(&dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Data directory is not writable (fix perms or choose a different --data-dir)"
            );
            return Err(e);
        }
    }

    let pipeline = build_pipeline(&args.global).await?;

    match args.command {
        Command::Run(run) => {
            let summary = run_once(&pipeline, &run.to_request(), run.report_dir.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::List(list) => {
            let docs = pipeline.store().recent(list.limit).await?;
            if list.json {
                println!("{}", serde_json::to_string_pretty(&docs)?);
            } else {
                print!("{}", render_documents(&docs));
            }
        }
        Command::Schedule(schedule) => {
            run_daily(
                &pipeline,
                &schedule.run.to_request(),
                schedule.at,
                schedule.run.report_dir.as_deref(),
            )
            .await;
        }
        Command::Serve(serve) => {
            server::serve(pipeline, serve.bind).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(elapsed_secs = elapsed.as_secs_f64(), "regwatch finished");
    Ok(())
}
