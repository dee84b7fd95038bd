use crate::spindle_log::SpindleLogger;
use clap::Parser;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Upstream base URL; path and query of every inbound request are
    /// appended to it.
    #[arg(long, default_value = crate::constants::DEFAULT_UPSTREAM)]
    pub upstream: String,
    #[arg(long, default_value = "spindles.jsonl")]
    pub spindle_log: String,
    #[arg(long, default_value = "captures")]
    pub dump_dir: String,
    #[arg(long, default_value_t = false)]
    pub disable_raw_dump: bool,
    #[arg(long, default_value_t = false)]
    pub disable_preview: bool,
    /// Upper bound on one upstream call, body included. Thinking streams run
    /// long, so this is generous.
    #[arg(long, default_value_t = 1800)]
    pub request_timeout_secs: u64,
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,
    #[arg(long, default_value_t = 50 * 1024 * 1024)]
    pub max_body_size: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    /// Normalized upstream base URL (no trailing slash).
    pub upstream: String,
    pub logger: SpindleLogger,
    pub args: Arc<Args>,
}
