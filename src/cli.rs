//! Command-line interface definitions for RegWatch.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Shared settings can be provided via command-line flags or environment
//! variables and may appear before or after the subcommand.

use chrono::NaiveTime;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::TranslatorBackend;
use crate::models::RunRequest;

/// Command-line arguments for the RegWatch application.
///
/// # Examples
///
/// ```sh
/// # One pass over the default source
/// regwatch run
///
/// # Two sources, French output, an extra keyword, and a JSON run report
/// regwatch run --source BCL --source ECB --lang fr --keyword "climate risk" --report-dir ./reports
///
/// # Daily at 07:30 local time
/// regwatch schedule --at 07:30 --source ECB
///
/// # HTTP operator surface
/// regwatch serve --bind 0.0.0.0:8080
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline once
    Run(RunArgs),
    /// Show recently registered documents
    List(ListArgs),
    /// Run the full pipeline every day at a fixed local time
    Schedule(ScheduleArgs),
    /// Serve the JSON operator API
    Serve(ServeArgs),
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding metadata.db and the downloaded documents
    #[arg(long, global = true, env = "REGWATCH_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// YAML file listing the watched sources (replaces the built-in BCL/ECB/BDF)
    #[arg(long, global = true, env = "REGWATCH_SOURCES_FILE")]
    pub sources_file: Option<PathBuf>,

    /// File extension treated as a document link (repeatable)
    #[arg(long = "extension", global = true, default_value = ".pdf")]
    pub extensions: Vec<String>,

    /// OpenAI-compatible API root
    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub llm_base_url: String,

    #[arg(long, global = true, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Retries for language-model calls (0 disables retrying)
    #[arg(long, global = true, env = "REGWATCH_LLM_RETRIES", default_value_t = 2)]
    pub llm_retries: usize,

    /// Translation backend
    #[arg(long, global = true, value_enum, default_value_t = TranslatorBackend::Chat)]
    pub translator: TranslatorBackend,

    #[arg(long, global = true, env = "LIBRETRANSLATE_URL")]
    pub libretranslate_url: Option<String>,

    #[arg(long, global = true, env = "LIBRETRANSLATE_API_KEY", hide_env_values = true)]
    pub libretranslate_api_key: Option<String>,

    /// Maximum characters per translation call
    #[arg(long, global = true, default_value_t = crate::stages::translator::DEFAULT_CHUNK_CHARS)]
    pub chunk_chars: usize,

    /// Characters of translated text sent for analysis
    #[arg(long, global = true, default_value_t = crate::stages::analyzer::DEFAULT_ANALYSIS_CHARS)]
    pub analysis_chars: usize,

    #[arg(long, global = true, env = "EMAIL_SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, global = true, env = "EMAIL_SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, global = true, env = "EMAIL_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, global = true, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    #[arg(long, global = true, env = "EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Notification recipient
    #[arg(long, global = true, env = "EMAIL_TO")]
    pub email_to: Option<String>,

    /// Name shown in notification subjects
    #[arg(long, global = true, env = "REGWATCH_PRODUCT_NAME", default_value = "RegWatch")]
    pub product_name: String,

    /// Also write logs to a daily-rotated file at this path
    #[arg(long, global = true, env = "REGWATCH_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Source code to fetch (repeatable)
    #[arg(long = "source", default_value = "BCL")]
    pub sources: Vec<String>,

    /// Target language for translations
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Extra analysis keyword (repeatable)
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// Write the run summary as JSON under this directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
}

impl RunArgs {
    pub fn to_request(&self) -> RunRequest {
        RunRequest {
            sources: self.sources.clone(),
            target_language: self.lang.clone(),
            extra_keywords: self.keywords.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Local time of day, HH:MM
    #[arg(long, default_value = "10:00", value_parser = parse_time_of_day)]
    pub at: NaiveTime,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "REGWATCH_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| format!("expected HH:MM, got {s:?}: {e}"))
}
