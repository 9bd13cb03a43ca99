use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

fn timer() -> OffsetTime<time::format_description::well_known::Rfc3339> {
    OffsetTime::local_rfc_3339().unwrap_or_else(|_| {
        // Local offset is unavailable in some environments
        OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )
    })
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Console-only logging on stderr, for short-lived commands
pub fn init_console(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(timer())
                .with_target(false),
        )
        .with(filter(default_level))
        .init();
}

/// Console logging plus a daily rolling file in `log_dir`.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the life of the process.
pub fn init_with_file(log_dir: &Path, default_level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("polagent")
        .filename_suffix("log")
        .build(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let timer = timer();
    tracing_subscriber::registry()
        // File layer with full details
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_timer(timer.clone())
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(timer)
                .with_target(false),
        )
        .with(filter(default_level))
        .init();

    tracing::info!("Log files are being written to: {:?}", log_dir);
    Ok(guard)
}
