use std::fs;
use std::io::IsTerminal;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::CONFIG;

pub const TIMING_TARGET: &str = "banner.timing";

const LOGS_DIR: &str = "logs";

/// Where console logs go. CLI runs keep stdout for their own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    Bot,
    Cli,
}

impl ConsoleMode {
    fn writer(self) -> BoxMakeWriter {
        match self {
            ConsoleMode::Bot => BoxMakeWriter::new(std::io::stdout),
            ConsoleMode::Cli => BoxMakeWriter::new(std::io::stderr),
        }
    }

    fn ansi(self) -> bool {
        match self {
            ConsoleMode::Bot => std::io::stdout().is_terminal(),
            ConsoleMode::Cli => std::io::stderr().is_terminal(),
        }
    }

    /// CLI runs only surface warnings on the console; files still get `level`.
    fn console_level(self, level: LevelFilter) -> LevelFilter {
        match self {
            ConsoleMode::Bot => level,
            ConsoleMode::Cli => level.min(LevelFilter::WARN),
        }
    }
}

pub struct LoggingGuards {
    _file_guard: WorkerGuard,
    _timing_guard: WorkerGuard,
    _json_file_guard: WorkerGuard,
    _json_timing_guard: WorkerGuard,
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

fn general_filter(level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(level)
        .with_target(TIMING_TARGET, LevelFilter::OFF)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN)
        .with_target("teloxide", LevelFilter::WARN)
}

/// Installs a console layer plus daily-rolling text and JSON files under `logs/`.
/// Timing events (`banner.timing`) are split into their own files.
pub fn init_logging(mode: ConsoleMode) -> LoggingGuards {
    let logs_dir = Path::new(LOGS_DIR);
    if let Err(err) = fs::create_dir_all(logs_dir) {
        eprintln!("Failed to create logs directory: {err}");
    }

    let file_appender = tracing_appender::rolling::daily(logs_dir, "banner_bot.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let timing_appender = tracing_appender::rolling::daily(logs_dir, "timing.log");
    let (timing_writer, timing_guard) = tracing_appender::non_blocking(timing_appender);

    let json_file_appender = tracing_appender::rolling::daily(logs_dir, "banner_bot.jsonl");
    let (json_file_writer, json_file_guard) = tracing_appender::non_blocking(json_file_appender);

    let json_timing_appender = tracing_appender::rolling::daily(logs_dir, "timing.jsonl");
    let (json_timing_writer, json_timing_guard) =
        tracing_appender::non_blocking(json_timing_appender);

    let general_level = parse_log_level(&CONFIG.log_level);
    let file_filter = general_filter(general_level);
    let console_filter = general_filter(mode.console_level(general_level));
    let timing_filter = Targets::new()
        .with_default(LevelFilter::OFF)
        .with_target(TIMING_TARGET, LevelFilter::INFO);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(file_filter.clone());
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(mode.writer())
        .with_ansi(mode.ansi())
        .with_filter(console_filter);
    let timing_layer = tracing_subscriber::fmt::layer()
        .with_writer(timing_writer)
        .with_ansi(false)
        .with_filter(timing_filter.clone());
    let json_file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(json_file_writer)
        .with_filter(file_filter);
    let json_timing_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(json_timing_writer)
        .with_filter(timing_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(timing_layer)
        .with(json_file_layer)
        .with(json_timing_layer)
        .init();

    LoggingGuards {
        _file_guard: file_guard,
        _timing_guard: timing_guard,
        _json_file_guard: json_file_guard,
        _json_timing_guard: json_timing_guard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_default_to_info() {
        assert_eq!(parse_log_level("WARNING"), LevelFilter::WARN);
        assert_eq!(parse_log_level(" debug "), LevelFilter::DEBUG);
        assert_eq!(parse_log_level("loud"), LevelFilter::INFO);
    }

    #[test]
    fn cli_console_only_shows_warnings() {
        let module = "banner_prompt_bot::banner::analysis";
        let bot = general_filter(ConsoleMode::Bot.console_level(LevelFilter::INFO));
        let cli = general_filter(ConsoleMode::Cli.console_level(LevelFilter::INFO));

        assert!(bot.would_enable(module, &tracing::Level::INFO));
        assert!(!cli.would_enable(module, &tracing::Level::INFO));
        assert!(cli.would_enable(module, &tracing::Level::WARN));
        assert_eq!(
            ConsoleMode::Cli.console_level(LevelFilter::ERROR),
            LevelFilter::ERROR
        );
    }

    #[test]
    fn timing_events_stay_off_the_console() {
        let filter = general_filter(LevelFilter::TRACE);
        assert!(!filter.would_enable(TIMING_TARGET, &tracing::Level::INFO));
    }
}
