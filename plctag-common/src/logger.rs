use crate::{
    error::{CommonError, CommonResult},
    settings::LogSettings,
};
use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};
use tracing::{subscriber::set_global_default, Level, Metadata};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    filter::{filter_fn, FilterFn},
    fmt,
    layer::SubscriberExt,
    Layer, Registry,
};

const LOG_FILE_NAME: &str = "plctag.log";

pub struct Logger {
    level: Arc<Mutex<Level>>,
    directory: Option<String>,
    _file_guard: Option<WorkerGuard>,
}

impl Logger {
    pub fn new(level: Option<Level>) -> Self {
        Logger {
            level: Arc::new(Mutex::new(level.unwrap_or(Level::INFO))),
            directory: None,
            _file_guard: None,
        }
    }

    /// Build a logger from the `[log]` settings section.
    ///
    /// Fails when the configured level is not one of `trace`, `debug`, `info`,
    /// `warn` or `error` (case-insensitive).
    pub fn from_settings(settings: &LogSettings) -> CommonResult<Self> {
        let mut logger = Logger::new(Some(parse_level(&settings.level)?));
        logger.directory = settings.directory.clone();
        Ok(logger)
    }

    /// Sets the new logging level.
    ///
    /// Takes effect immediately for every layer installed by `initialize`.
    #[inline]
    pub fn set_level(&self, new_level: Level) {
        let mut level = self.level.lock().unwrap_or_else(|e| e.into_inner());
        *level = new_level;
    }

    #[inline]
    pub fn get_level(&self) -> Level {
        *self.level.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Initializes the global subscriber.
    ///
    /// Output always goes to stdout. When a log directory is configured, a daily
    /// rolling file is written there as well through a non-blocking writer whose
    /// guard lives as long as this logger.
    pub fn initialize(&mut self) -> CommonResult<()> {
        let console_layer = {
            #[cfg(debug_assertions)]
            let layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stdout)
                .with_file(true)
                .with_line_number(true);

            #[cfg(not(debug_assertions))]
            let layer = fmt::layer()
                .with_writer(std::io::stdout)
                .with_file(false)
                .with_line_number(false);

            layer.with_filter(self.level_filter())
        };

        let file_layer = match self.directory.as_deref() {
            Some(dir) => {
                let file_appender = rolling::daily(dir, LOG_FILE_NAME);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                self._file_guard = Some(guard);
                Some(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_filter(self.level_filter()),
                )
            }
            None => None,
        };

        let subscriber = Registry::default().with(console_layer).with(file_layer);

        set_global_default(subscriber)
            .map_err(|e| CommonError::LoggerError(format!("Failed to set logger: {e}")))
    }

    fn level_filter(&self) -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
        let level = Arc::clone(&self.level);
        filter_fn(move |metadata| {
            metadata.level() <= &*level.lock().unwrap_or_else(|e| e.into_inner())
        })
    }
}

/// Parse a textual level such as `"debug"` or `"WARN"`.
pub fn parse_level(value: &str) -> CommonResult<Level> {
    Level::from_str(value.trim()).map_err(|_| CommonError::InvalidLogLevel(value.to_string()))
}
