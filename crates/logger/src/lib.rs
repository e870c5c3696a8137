use std::env::var;
use std::io::stderr;
use std::path::Path;

use tracing::{level_filters::LevelFilter, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    Layer, Registry, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log to stderr only.
pub fn init() {
    initialize_tracing(LevelFilter::INFO, None);
}

/// Log to stderr and append to `log_file`.
///
/// Keep the returned guard alive until exit, dropping it flushes the file.
/// A log file that cannot be opened is reported and skipped.
pub fn init_with_file(log_file: &Path) -> Option<WorkerGuard> {
    initialize_tracing(LevelFilter::INFO, Some(log_file))
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder().with_default_directive(level.into()).from_env_lossy()
}

/// Initialize tracing subscriber with default configuration.
fn initialize_tracing(level: LevelFilter, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    // stdout belongs to the status display
    let console_layer: BoxedLayer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(stderr)
            .with_filter(env_filter(level))
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_writer(stderr)
            .with_filter(env_filter(level))
            .boxed(),
    };

    let mut layers = vec![console_layer];
    let mut guard = None;
    let mut file_error = None;

    if let Some(path) = log_file {
        match open_log_file(path) {
            Ok(appender) => {
                let (writer, worker_guard) = tracing_appender::non_blocking(appender);
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .with_filter(env_filter(level))
                        .boxed(),
                );
                guard = Some(worker_guard);
            }
            Err(error) => file_error = Some(error),
        }
    }

    tracing_subscriber::registry().with(layers).init();

    if let (Some(path), Some(error)) = (log_file, file_error) {
        warn!(path = %path.display(), "Failed to open log file, logging to stderr only: {error}");
    }

    guard
}

/// Appending, never rotated writer for `path`, creating parent directories.
fn open_log_file(path: &Path) -> Result<RollingFileAppender, InitError> {
    let directory =
        path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app.log".to_string());

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
}
