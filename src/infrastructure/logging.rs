use std::io::{self, IsTerminal};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{config::AppConfig, infrastructure::directories::ResolvedPaths};

const LOG_FILE: &str = "spam-report.log";
const FALLBACK_LEVEL: &str = "info";

/// HTTP client internals log every connection at debug.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Installs the global subscriber once. Console output goes to stderr so
/// stdout carries nothing but the report.
pub fn init_tracing(config: &AppConfig, paths: &ResolvedPaths) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(&paths.logs_dir, LOG_FILE));
        let _ = GUARD.set(guard);

        tracing_subscriber::registry()
            .with(build_filter(&config.logging.level))
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_ansi(io::stderr().is_terminal()),
            )
            .with(fmt::layer().with_writer(file_writer).with_ansi(false))
            .try_init()?;

        tracing::debug!(
            logs = %paths.logs_dir.display(),
            level = %config.logging.level,
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise `level` with the HTTP stack turned down.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(level)))
        .unwrap_or_else(|err| {
            eprintln!("invalid LOG_LEVEL {level:?} ({err}); using {FALLBACK_LEVEL}");
            EnvFilter::new(filter_directives(FALLBACK_LEVEL))
        })
}

fn filter_directives(level: &str) -> String {
    let level = match level.trim() {
        "" => FALLBACK_LEVEL,
        level => level,
    };
    std::iter::once(level)
        .chain(QUIET_TARGETS.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}
