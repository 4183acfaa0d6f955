//! `tracing` initialization: a daily-rotating file appender under the OS
//! cache/log directory (never stdout — stdout is the alternate screen the
//! terminal UI owns). Level is controlled by `RUST_LOG`, defaulting to
//! `info`.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global subscriber. The returned [`WorkerGuard`] must be
/// held for the program's lifetime — dropping it early stops log flushing.
pub fn init() -> anyhow::Result<WorkerGuard> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "vtmap.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vtmap=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(dir = %log_dir.display(), "vtmap starting");
    Ok(guard)
}

fn log_directory() -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("vtmap").join("logs")
}
