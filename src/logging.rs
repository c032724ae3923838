//! Tracing subscriber setup for terminal and rolling-file output.

use crate::config::LogConfig;
use crate::redact::{redact, truncate_chars};

use anyhow::Context as _;
use tracing_subscriber::fmt::format;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const MAX_MESSAGE_CHARS: usize = 280;

/// Keeps the non-blocking file writer alive. Drop it only at process exit so
/// buffered lines are flushed.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global subscriber.
///
/// `debug` forces the `debug` level regardless of `LOG_LEVEL`. When file
/// logging is enabled a daily-rolling `threadrelay.log` is written next to
/// the terminal output.
pub fn init_tracing(config: &LogConfig, debug: bool) -> anyhow::Result<LogGuard> {
    let filter = build_env_filter(&config.level, debug);

    let terminal_layer = tracing_subscriber::fmt::layer()
        .fmt_fields(format::debug_fn(format_field))
        .compact();

    if !config.to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(terminal_layer)
            .try_init()
            .context("failed to install tracing subscriber")?;
        return Ok(LogGuard { _file_guard: None });
    }

    std::fs::create_dir_all(&config.dir).with_context(|| {
        format!("failed to create log directory: {}", config.dir.display())
    })?;
    let file_appender = tracing_appender::rolling::daily(&config.dir, "threadrelay.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .fmt_fields(format::debug_fn(format_field))
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(terminal_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(LogGuard {
        _file_guard: Some(guard),
    })
}

fn build_env_filter(level: &str, debug: bool) -> tracing_subscriber::EnvFilter {
    if debug {
        return tracing_subscriber::EnvFilter::new("debug");
    }
    // Gateway internals are noisy at info.
    let directives = format!("{level},serenity=warn,tracing::span=warn");
    tracing_subscriber::EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Formats event fields, masking secrets and truncating long `message` values.
fn format_field(
    writer: &mut format::Writer<'_>,
    field: &tracing::field::Field,
    value: &dyn std::fmt::Debug,
) -> std::fmt::Result {
    let field_name = field.name();
    let formatted = redact(&format!("{value:?}"));

    if field_name == "message" {
        let truncated = truncate_chars(&formatted, MAX_MESSAGE_CHARS);
        if truncated.len() < formatted.len() {
            write!(writer, "{truncated}...")
        } else {
            write!(writer, "{formatted}")
        }
    } else {
        write!(writer, "{field_name}={formatted}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_configured_level() {
        let filter = build_env_filter("warn", true);
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn configured_level_quiets_gateway_internals() {
        let filter = build_env_filter("info", false).to_string();
        assert!(filter.contains("serenity=warn"));
    }
}
