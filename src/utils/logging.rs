use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::CONFIG;

const LOGS_DIR: &str = "logs";
pub const TIMING_TARGET: &str = "bot.timing";

/// Keeps the non-blocking writers flushing until `main` returns.
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

fn general_targets(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(TIMING_TARGET, LevelFilter::OFF)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN)
        .with_target("tower_http", LevelFilter::WARN)
        .with_target("teloxide", LevelFilter::INFO)
}

fn timing_targets() -> Targets {
    Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO)
}

fn rolling_writer(logs_dir: &Path, file_name: &str, guards: &mut Vec<WorkerGuard>) -> NonBlocking {
    let appender = tracing_appender::rolling::daily(logs_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    writer
}

/// Stdout plus daily-rolling text and JSONL files. Service and request
/// timing events go only to the `timing.*` files.
pub fn init_logging() -> LoggingGuards {
    let logs_dir = Path::new(LOGS_DIR);
    if let Err(err) = fs::create_dir_all(logs_dir) {
        eprintln!("Failed to create logs directory: {err}");
    }

    let mut guards = Vec::with_capacity(4);
    let general_filter = general_targets(parse_log_level(&CONFIG.log_level));
    let timing_filter = timing_targets();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(general_filter.clone());
    let text_layer = tracing_subscriber::fmt::layer()
        .with_writer(rolling_writer(logs_dir, "photo_critique.log", &mut guards))
        .with_ansi(false)
        .with_filter(general_filter.clone());
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(rolling_writer(logs_dir, "photo_critique.jsonl", &mut guards))
        .with_filter(general_filter);
    let timing_text_layer = tracing_subscriber::fmt::layer()
        .with_writer(rolling_writer(logs_dir, "timing.log", &mut guards))
        .with_ansi(false)
        .with_filter(timing_filter.clone());
    let timing_json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(rolling_writer(logs_dir, "timing.jsonl", &mut guards))
        .with_filter(timing_filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(text_layer)
        .with(json_layer)
        .with(timing_text_layer)
        .with(timing_json_layer)
        .init();

    LoggingGuards { _guards: guards }
}
