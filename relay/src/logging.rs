// Logging for Relay
//
// Thin setup layer over the `tracing` ecosystem. Worker threads inherit the
// subscriber that was current when the pool started them, so logs from every
// worker end up in the same place as the caller's.
//
// # Usage Examples
//
// ```rust
// use relay::logging;
//
// // INFO level, human-readable console output
// logging::init_default();
//
// logging::info!("pool ready");
// logging::log_lifecycle!("worker", 3, "started");
// ```
//
// `init_development`, `init_production` and `init_test` are presets; `init`
// takes a full `LogConfig`; `init_with_file` also appends to a file.

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    filter::LevelFilter, fmt, prelude::*, registry::LookupSpan, EnvFilter, Layer,
};

/// Configuration for the logging system
///
/// ```rust
/// use relay::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     target_filters: Some("relay::thread=trace".to_string()),
///     ..Default::default()
/// };
/// assert!(!config.json_format);
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter =
        EnvFilter::from_default_env().add_directive(LevelFilter::from_level(config.level).into());

    if let Some(filters) = &config.target_filters {
        for filter_str in filters.split(',') {
            if let Ok(directive) = filter_str.trim().parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

/// Console layer matching `config`
fn console_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info);

    match (config.json_format, config.show_time) {
        (true, true) => layer.json().flatten_event(true).boxed(),
        (true, false) => layer.json().flatten_event(true).without_time().boxed(),
        (false, true) => layer.boxed(),
        (false, false) => layer.without_time().boxed(),
    }
}

/// Initialize the logging system with the given configuration
///
/// Sets the global tracing subscriber. Safe to call more than once; only the
/// first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer(&config));

        set_global_subscriber(subscriber);
    });
}

// Helper function to set the global subscriber
fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` for appending, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Box::new(file))
}

/// Initialize logging to both the console and `log_file`
///
/// The file always gets plain text with file, line and thread information.
///
/// # Errors
/// Returns an error if the file cannot be opened or created
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    // Fail early instead of silently falling back to stderr later on
    file_writer(log_file)?;

    INIT.call_once(|| {
        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || -> Box<dyn io::Write + Send + Sync> {
                match file_writer(&log_file_path) {
                    Ok(writer) => writer,
                    Err(_) => Box::new(io::stderr()),
                }
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer(&config))
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG everywhere, TRACE for the worker runtime, with colors and locations.
pub fn init_development() {
    let config = LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("relay=debug,relay::thread=trace".to_string()),
    };
    init(config);
}

/// INFO level JSON for log aggregators; no file/line information.
pub fn init_production() {
    let config = LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    };
    init(config);
}

/// Initialize logging for testing
///
/// Only warnings and errors, no thread info or timestamps, to keep test
/// output readable.
///
/// ```rust
/// #[test]
/// fn my_test() {
///     relay::logging::init_test();
///     // ...
/// }
/// ```
pub fn init_test() {
    let config = LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    };
    init(config);
}

/// Span covering the whole life of a worker thread
///
/// ```rust
/// let pool_id = uuid::Uuid::new_v4();
/// let span = relay::worker_span!(pool_id, 2);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! worker_span {
    ($pool_id:expr, $index:expr) => {
        tracing::info_span!("worker", pool = %$pool_id, index = $index)
    };
    ($pool_id:expr, $index:expr, $($fields:tt)*) => {
        tracing::info_span!("worker", pool = %$pool_id, index = $index, $($fields)*)
    };
}

/// Span around the handling of one packet
#[macro_export]
macro_rules! packet_span {
    ($type_id:expr) => {
        tracing::trace_span!("packet", type_id = $type_id)
    };
    ($type_id:expr, $($fields:tt)*) => {
        tracing::trace_span!("packet", type_id = $type_id, $($fields)*)
    };
}

/// Span around a pool-wide operation
#[macro_export]
macro_rules! pool_span {
    ($pool_id:expr, $operation:expr) => {
        tracing::info_span!("pool", id = %$pool_id, operation = $operation)
    };
    ($pool_id:expr, $operation:expr, $($fields:tt)*) => {
        tracing::info_span!("pool", id = %$pool_id, operation = $operation, $($fields)*)
    };
}

/// Log lifecycle events of workers and pools
///
/// ```rust
/// relay::log_lifecycle!("worker", 0, "started");
/// relay::log_lifecycle!("pool", "p-1", "created", workers = 4);
/// ```
#[macro_export]
macro_rules! log_lifecycle {
    ($component:expr, $id:expr, $event:expr) => {
        tracing::info!(component = $component, id = %$id, event = $event);
    };
    ($component:expr, $id:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(component = $component, id = %$id, event = $event, $($fields)*);
    };
}

#[macro_export]
macro_rules! log_packet {
    ($type_id:expr, $status:expr) => {
        tracing::debug!(type_id = $type_id, status = $status);
    };
    ($type_id:expr, $status:expr, $($fields:tt)*) => {
        tracing::debug!(type_id = $type_id, status = $status, $($fields)*);
    };
}

/// Log error events
///
/// ```rust
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
/// relay::log_error!(error, component = "pool");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error);
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*);
    };
}

/// Get the current tracing dispatcher
///
/// Worker threads are spawned inside this dispatcher so that a subscriber set
/// with `tracing::subscriber::set_default` on the caller's thread also
/// covers them.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
