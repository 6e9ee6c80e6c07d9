//! Structured logging setup.
//!
//! The runtime emits `tracing` events under the `rnnef_runtime` target: run
//! start and finish at info, one debug event per operation, one trace event
//! per engine primitive. [`init_logging`] installs a `tracing-subscriber`
//! pipeline whose filter applies the configured level to the rnnef crates
//! and a separate, quieter level to everything else.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose events follow [`LoggingConfig::level`].
const RNNEF_TARGETS: &[&str] = &["rnnef_core", "rnnef_runtime"];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for the rnnef crates.
    pub level: LogLevel,
    /// Level for every other crate.
    pub dependency_level: LogLevel,
    /// Include file and line of each event.
    pub with_source_location: bool,
    /// Emit one JSON object per event.
    pub json_format: bool,
}

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Every engine primitive call
    Trace,
    /// Every executed operation
    Debug,
    /// Run start and finish
    Info,
    /// Failed operations and tensor release failures
    Warn,
    /// Errors only
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            dependency_level: LogLevel::Warn,
            with_source_location: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level for the rnnef crates.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the level for every other crate.
    pub fn with_dependency_level(mut self, level: LogLevel) -> Self {
        self.dependency_level = level;
        self
    }

    /// Enable or disable source code locations.
    pub fn with_source_location(mut self, enable: bool) -> Self {
        self.with_source_location = enable;
        self
    }

    /// Enable or disable JSON output format.
    pub fn with_json_format(mut self, enable: bool) -> Self {
        self.json_format = enable;
        self
    }

    /// Every engine primitive call, with source locations.
    pub fn dispatch_tracing() -> Self {
        Self::default()
            .with_level(LogLevel::Trace)
            .with_source_location(true)
    }

    /// Run summaries and failures as JSON.
    pub fn production() -> Self {
        Self::default().with_json_format(true)
    }

    /// Filter directives, e.g. `warn,rnnef_core=info,rnnef_runtime=info`.
    pub fn directives(&self) -> String {
        let level = self.level.to_tracing_level();
        let mut directives = self.dependency_level.to_tracing_level().as_str().to_lowercase();
        for target in RNNEF_TARGETS {
            directives.push_str(&format!(",{target}={}", level.as_str().to_lowercase()));
        }
        directives
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.directives()))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` replaces the configured directives when set. Returns `false`
/// if a global subscriber was already installed (for example by another
/// test), in which case the existing one is kept.
pub fn init_logging(config: LoggingConfig) -> bool {
    let env_filter = config.env_filter();
    let registry = tracing_subscriber::registry().with(env_filter);

    let layer = fmt::layer()
        .with_file(config.with_source_location)
        .with_line_number(config.with_source_location);
    if config.json_format {
        registry.with(layer.json()).try_init().is_ok()
    } else {
        registry.with(layer).try_init().is_ok()
    }
}

/// Initialize logging with default configuration.
pub fn init_default_logging() -> bool {
    init_logging(LoggingConfig::default())
}
