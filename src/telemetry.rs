use anyhow::Context;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::LoggingConfig;
use crate::execution::SWAP_LOG_TARGET;

pub const ACTIVITY_LOG: &str = "activity.log";
pub const SWAP_LOG: &str = "swap.log";

/// Console plus two append-only files under `log_dir`:
/// `activity.log` gets everything, `swap.log` only swap journal lines.
///
/// Keep the returned guards alive for the life of the process or buffered
/// lines are lost.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Vec<WorkerGuard>> {
    let dir = Path::new(&config.log_dir);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let (activity_writer, activity_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, ACTIVITY_LOG));
    let (swap_writer, swap_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, SWAP_LOG));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(true);

    let activity_layer = tracing_subscriber::fmt::layer()
        .with_writer(activity_writer)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    let swap_layer = tracing_subscriber::fmt::layer()
        .with_writer(swap_writer)
        .with_target(false)
        .with_ansi(false)
        .with_filter(Targets::new().with_target(SWAP_LOG_TARGET, Level::INFO));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(activity_layer)
        .with(swap_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::info!("Logging initialized, writing to {}", dir.display());

    Ok(vec![activity_guard, swap_guard])
}
