use crate::settings::LoggingSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. When a log directory is
/// configured, output goes to a daily rolling file and the returned guard must
/// be kept alive for the lifetime of the program so buffered lines get flushed.
pub fn init_tracing(settings: &LoggingSettings) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let installed = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            if installed.is_err() {
                tracing::debug!("A global tracing subscriber is already installed.");
            }
            Some(guard)
        }
        None => {
            if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
                tracing::debug!("A global tracing subscriber is already installed.");
            }
            None
        }
    }
}
