//! Tracing setup for hosts embedding the crate
//!
//! The algorithms only emit `tracing` events and never install a subscriber
//! themselves. A host binary (desktop shell, import CLI) calls
//! [`init_tracing`] once at startup; test binaries call [`init_test_tracing`]
//! so events end up in the captured test output.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AlgoError, Result};

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_DIR: &str = "./logs";
const LOG_FILE_PREFIX: &str = "kaoshi";
const LOG_FILE_SUFFIX: &str = "log";

/// Where and how much the host wants to log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directives, e.g. `kaoshi_algo=debug`
    pub filter: String,
    /// Directory for daily rolling files; stdout only when `None`
    pub file_dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            file_dir: None,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `KAOSHI_LOG` sets the filter; with `KAOSHI_FILE_LOGS` set to `1`/`true`
    /// files go to `KAOSHI_LOG_DIR` (default `./logs`)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let filter = lookup("KAOSHI_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let file_logs = lookup("KAOSHI_FILE_LOGS")
            .map(|v| matches!(v.trim(), "1" | "true"))
            .unwrap_or(false);
        let file_dir = file_logs.then(|| {
            lookup("KAOSHI_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
        });

        Self { filter, file_dir }
    }
}

/// Keeps the background file writer alive; file logging stops when dropped
#[derive(Debug)]
pub struct FileLogGuard {
    _guard: WorkerGuard,
    dir: PathBuf,
}

impl FileLogGuard {
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Install the global subscriber.
///
/// Fails with [`AlgoError::Logging`] when the filter does not parse, the log
/// directory cannot be opened, or another subscriber is already installed.
/// In the last case no file guard is handed out, so the caller knows the
/// daily file is not being written.
pub fn init_tracing(settings: &LogSettings) -> Result<Option<FileLogGuard>> {
    let env_filter = EnvFilter::try_new(&settings.filter).map_err(|err| {
        AlgoError::Logging(format!("invalid log filter {:?}: {err}", settings.filter))
    })?;
    let stdout_layer = fmt::layer().with_target(true);

    let Some(dir) = &settings.file_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .try_init()
            .map_err(not_installed)?;
        return Ok(None);
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(dir)
        .map_err(|err| {
            AlgoError::Logging(format!("cannot open log directory {}: {err}", dir.display()))
        })?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(not_installed)?;

    Ok(Some(FileLogGuard {
        _guard: guard,
        dir: dir.clone(),
    }))
}

/// Subscriber for test binaries, writing through libtest's capture.
///
/// Returns `false` when a subscriber was already installed in this process.
pub fn init_test_tracing() -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::new("kaoshi_algo=debug"))
        .with(fmt::layer().with_target(true).with_test_writer())
        .try_init()
        .is_ok()
}

fn not_installed(err: TryInitError) -> AlgoError {
    AlgoError::Logging(format!("subscriber not installed: {err}"))
}
