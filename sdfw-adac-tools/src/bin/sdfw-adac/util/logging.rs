use std::{fs::File, path::PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter as TracingLevel;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Console level used when neither a level nor `RUST_LOG` is given.
const DEFAULT_CONSOLE_LEVEL: TracingLevel = TracingLevel::WARN;

/// Flushes the JSON log when dropped.
pub struct LogFile {
    _worker: WorkerGuard,
    path: PathBuf,
}

impl Drop for LogFile {
    fn drop(&mut self) {
        tracing::info!("Wrote log to {}", self.path.display());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[clap(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LevelFilter> for TracingLevel {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        }
    }
}

/// Filter of the console output. An explicit level ignores `RUST_LOG`.
fn console_filter(level: Option<LevelFilter>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::builder()
            .with_default_directive(TracingLevel::from(level).into())
            .parse_lossy(""),
        None => EnvFilter::builder()
            .with_default_directive(DEFAULT_CONSOLE_LEVEL.into())
            .from_env_lossy(),
    }
}

/// Installs the global subscriber.
///
/// Console output goes to stderr so it never mixes with command results on stdout. With
/// a `log_file` every event down to `TRACE`, which includes each mailbox register access,
/// is additionally written to it as JSON lines. Keep the returned guard alive until the
/// program exits.
pub fn setup_logging(
    log_file: Option<PathBuf>,
    console_level: Option<LevelFilter>,
) -> anyhow::Result<Option<LogFile>> {
    let console = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(std::io::stderr)
        .with_filter(console_filter(console_level));

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(console).init();
        return Ok(None);
    };

    let file = File::create(&path)
        .with_context(|| format!("Failed to create the log file '{}'.", path.display()))?;
    // Register traces come in bursts, dropping lines would leave gaps in a transaction.
    let (writer, worker) = NonBlockingBuilder::default().lossy(false).finish(file);

    let json = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_filter(TracingLevel::TRACE);

    tracing_subscriber::registry().with(console).with(json).init();
    tracing::info!("Writing log to {}", path.display());

    Ok(Some(LogFile {
        _worker: worker,
        path,
    }))
}

#[cfg(test)]
mod test {
    use clap::ValueEnum;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case("OFF", TracingLevel::OFF)]
    #[test_case("WARN", TracingLevel::WARN)]
    #[test_case("TRACE", TracingLevel::TRACE)]
    fn level_names(name: &str, expected: TracingLevel) {
        let level = LevelFilter::from_str(name, false).unwrap();

        assert_eq!(TracingLevel::from(level), expected);
    }
}
