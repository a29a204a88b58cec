use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

pub const TELEMETRY_FILE: &str = "telemetry.jsonl";

/// Overrides the configured level with a full filter directive when set.
pub const FILTER_ENV: &str = "LUCKYCARD_LOG";

/// Keeps the appender worker alive; dropping it flushes pending events.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub telemetry_path: PathBuf,
}

/// Installs the JSON subscriber writing `telemetry.jsonl` next to the summary.
/// Returns `None` when structured logging is disabled.
pub fn init_logging(
    logging: &LoggingConfig,
    outputs: &ResolvedOutputs,
) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let (file, telemetry_path) = open_telemetry_file(&outputs.summary_dir())?;
    let (writer, guard) = NonBlockingBuilder::default().lossy(false).finish(file);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(event_filter(logging.level().unwrap_or(Level::INFO)))
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // Already installed when several runs share one process.
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(Some(LoggingGuard {
        _guard: guard,
        telemetry_path,
    }))
}

fn open_telemetry_file(dir: &Path) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating telemetry directory at {}", dir.display()))?;
    let path = dir.join(TELEMETRY_FILE);
    let file = File::create(&path)
        .with_context(|| format!("creating telemetry file at {}", path.display()))?;
    Ok((file, path))
}

/// Only `luckycard::*` targets reach the telemetry file unless the env override says otherwise.
fn event_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

fn default_directive(level: Level) -> String {
    format!("warn,luckycard={}", level.as_str().to_ascii_lowercase())
}
