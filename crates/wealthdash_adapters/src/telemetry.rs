use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::subscriber::set_global_default;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use wealthdash_core::Error;

/// Directory holding the rolling log files
pub fn log_dir() -> PathBuf {
    ProjectDirs::from("com", "wealthdash", "wealthdash")
        .map(|d| d.data_local_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the global subscriber: pretty stderr output plus a daily log file.
///
/// `RUST_LOG` overrides `env_filter`. Keep the returned guard alive for the
/// whole process or buffered file output is lost.
pub fn init_subscriber(name: &str, env_filter: &str) -> Result<WorkerGuard, Error> {
    LogTracer::init()
        .map_err(|e| Error::Configuration(format!("failed to initialize log bridge: {}", e)))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    let formatting_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .pretty();

    let file_appender = tracing_appender::rolling::daily(log_dir(), format!("{}.log", name));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(formatting_layer)
        .with(file_layer);

    set_global_default(subscriber)
        .map_err(|e| Error::Configuration(format!("failed to set tracing subscriber: {}", e)))?;

    Ok(guard)
}
