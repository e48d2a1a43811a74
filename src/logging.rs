use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::GraderConfig;

const LOG_FILE_PREFIX: &str = "grader.log";

/// Keeps the non-blocking file writer flushing; drop it on shutdown.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for a host process embedding the grader:
/// `config.log_level` as the filter, plus a daily file under
/// `config.log_dir` when `config.file_logs` is set.
///
/// Returns `None` when no file layer was installed. A second call is a no-op.
pub fn init_tracing(config: &GraderConfig) -> Option<FileLogGuard> {
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true);

    let file_writer = if config.file_logs {
        match std::fs::create_dir_all(&config.log_dir) {
            Ok(()) => {
                let appender =
                    RollingFileAppender::new(Rotation::DAILY, &config.log_dir, LOG_FILE_PREFIX);
                Some(tracing_appender::non_blocking(appender))
            }
            Err(err) => {
                eprintln!(
                    "failed to create log directory {}: {err}",
                    config.log_dir.display()
                );
                None
            }
        }
    } else {
        None
    };

    let Some((writer, guard)) = file_writer else {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .try_init();
        return None;
    };

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok()
        .map(|()| FileLogGuard { _guard: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_creates_dir_and_second_init_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("grader-logs");
        let config = GraderConfig {
            file_logs: true,
            log_dir: log_dir.clone(),
            log_level: "debug".to_string(),
            ..GraderConfig::default()
        };

        let _first = init_tracing(&config);
        assert!(log_dir.is_dir());

        let bad_filter = GraderConfig {
            log_level: "not a valid filter [".to_string(),
            ..GraderConfig::default()
        };
        assert!(init_tracing(&bad_filter).is_none());
    }
}
