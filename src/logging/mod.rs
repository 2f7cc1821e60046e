use crate::config::settings::LoggingConfig;
use log::{debug, error, info, warn};
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

static INIT: Once = Once::new();

/// Initialize the global logger from the configured level.
///
/// `RUST_LOG` wins over `log_level` when set. With file logging enabled a
/// daily rolling file is written in addition to the console; keep the
/// returned guard alive for as long as logs should be flushed. Calls after
/// the first are no-ops and return `None`.
pub fn init_logger_with_config(log_level: &str, logging: &LoggingConfig) -> Option<WorkerGuard> {
    let mut guard = None;

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let console = fmt::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true);

        let file = if logging.enable_file_logging {
            let appender = tracing_appender::rolling::daily(&logging.log_dir, &logging.file_prefix);
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard = Some(file_guard);
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        } else {
            None
        };

        let subscriber = Registry::default().with(filter).with(console).with(file);
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Warning: Failed to install tracing subscriber: {:?}", e);
            return;
        }

        // Bridge log events to tracing (after subscriber is set up)
        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }
    });

    guard
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Log a warning message
pub fn log_warning(message: &str) {
    warn!("{}", message);
}

/// Log a debug message
pub fn log_debug(message: &str) {
    debug!("{}", message);
}

/// Convenience macro for logging errors
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*));
    };
}

/// Convenience macro for logging info messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*));
    };
}

/// Convenience macro for logging warning messages
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::logging::log_warning(&format!($($arg)*));
    };
}

/// Convenience macro for logging debug messages
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug(&format!($($arg)*));
    };
}
