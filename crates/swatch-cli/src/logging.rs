use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use swatch_core::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "swatch.log";

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "swatch=info",
        1 => "swatch=debug",
        _ => "swatch=trace",
    }
}

/// Install the global subscriber: stderr always, plus a daily-rolling file
/// when `[logging] directory` is set. Keep the guard alive for the whole
/// process or buffered file lines are lost.
pub fn init(verbosity: u8, config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();

    if let Some(dir) = &config.directory {
        tracing::debug!(dir = %dir.display(), "File logging enabled");
    }
    guard
}
