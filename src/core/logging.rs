//! Process-wide `tracing` setup: console output plus a daily rolling file in
//! the log dir. File lines carry targets and close events of the `embed_all`
//! run spans, which include their busy/idle time.

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::AppPaths;

const LOG_FILE_PREFIX: &str = "pipeline.log";
/// sqlx logs every statement at `info`; keep it quiet unless asked for.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. `RUST_LOG` replaces the default directives.
///
/// Only the first call installs anything; later calls are no-ops.
pub fn init(paths: &AppPaths) {
    if LOG_GUARD.get().is_some() {
        return;
    }

    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer().with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking);

    let installed = tracing_subscriber::registry()
        .with(env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if installed.is_ok() {
        let _ = LOG_GUARD.set(guard);
    }
}

fn env_filter(raw: Option<&str>) -> EnvFilter {
    EnvFilter::try_new(filter_directives(raw))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

fn filter_directives(raw: Option<&str>) -> &str {
    match raw.map(str::trim) {
        Some(directives) if !directives.is_empty() => directives,
        _ => DEFAULT_DIRECTIVES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_rust_log_uses_defaults() {
        assert_eq!(filter_directives(None), DEFAULT_DIRECTIVES);
        assert_eq!(filter_directives(Some("   ")), DEFAULT_DIRECTIVES);
        assert_eq!(
            filter_directives(Some(" qa_pipeline=debug ")),
            "qa_pipeline=debug"
        );
    }

    #[test]
    fn repeated_init_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let paths =
            AppPaths::with_data_dir(dir.path().to_path_buf(), dir.path().join("data")).unwrap();
        init(&paths);
        init(&paths);
        tracing::info!("logging initialized twice");
    }
}
