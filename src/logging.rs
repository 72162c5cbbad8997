//! Log subscriber setup for processes embedding the resolver

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{ConfigError, DEFAULT_LOG_LEVEL, LOG_ENV_VAR, LogConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber described by `config`.
///
/// When logging to a file, the returned guard flushes pending lines on drop
/// and must be kept alive for the lifetime of the process.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let (writer, guard) = match config.file_path() {
        Some(path) => {
            let (writer, guard) = file_writer(&path)?;
            (writer, Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let layer: BoxedLayer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(guard.is_none())
            .with_writer(writer)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter(&config.level))
        .try_init()?;

    Ok(guard)
}

/// Filter from `TKR_RESOLVER_LOG` if set and valid, else from `level`,
/// else `info`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn file_writer(path: &Path) -> Result<(BoxMakeWriter, WorkerGuard), ConfigError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ConfigError::InvalidLogPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((BoxMakeWriter::new(writer), guard))
}
