//! Structured logging and tracing for twcbus
//!
//! Console output by default, with an optional daily-rotated file sink for
//! installs where stdout is not collected by the service supervisor.

use crate::config::LoggingConfig;
use crate::error::{BridgeError, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Once;
use tracing::{Level, debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// Holds the file writer's worker guard; dropping it would lose buffered lines
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static INIT_ONCE: Once = Once::new();
static INIT_ERROR: OnceCell<String> = OnceCell::new();

/// Install the global subscriber. Later calls return the outcome of the
/// first one.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        if let Err(e) = install_subscriber(config) {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    match INIT_ERROR.get() {
        Some(err) => Err(BridgeError::config(err.clone())),
        None => Ok(()),
    }
}

/// Effective per-sink levels after applying the overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SinkLevels {
    console: Level,
    file: Level,
}

impl SinkLevels {
    fn from_config(config: &LoggingConfig) -> Result<Self> {
        let base = parse_log_level(&config.level)?;
        let resolve = |over: &Option<String>| -> Result<Level> {
            Ok(over
                .as_deref()
                .map(parse_log_level)
                .transpose()?
                .unwrap_or(base))
        };
        Ok(Self {
            console: resolve(&config.console_level)?,
            file: resolve(&config.file_level)?,
        })
    }

    /// `tracing` orders more verbose levels higher
    fn most_verbose(self) -> Level {
        self.console.max(self.file)
    }
}

fn install_subscriber(config: &LoggingConfig) -> Result<()> {
    let levels = SinkLevels::from_config(config)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("twcbus={},zbus=warn,reqwest=warn", levels.most_verbose()).into()
    });

    let file = if file_sink_enabled(config) {
        Some(file_layer(config, levels.file)?)
    } else {
        None
    };
    // Never end up with no sink at all
    let console = (config.console_output || file.is_none())
        .then(|| console_layer(config.json_format, levels.console));
    let file_enabled = file.is_some();

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(file)
        .with(console)
        .try_init();
    if let Err(e) = installed
        && !cfg!(test)
    {
        return Err(BridgeError::config(format!(
            "Failed to install subscriber: {}",
            e
        )));
    }

    if file_enabled {
        info!(
            "Logging initialized - console_level: {}, file_level: {}, dir: {}",
            levels.console,
            levels.file,
            log_dir(&config.file).display()
        );
    } else {
        info!("Logging initialized - console_level: {}", levels.console);
    }
    Ok(())
}

fn file_sink_enabled(config: &LoggingConfig) -> bool {
    !cfg!(test) && config.file_output && std::env::var_os("TWCBUS_DISABLE_FILE_LOG").is_none()
}

/// `file` may name a directory or a file inside the directory to use
fn log_dir(file: &str) -> &Path {
    let p = Path::new(file);
    match (p.extension(), p.parent()) {
        (Some(_), Some(parent)) => parent,
        _ => p,
    }
}

fn console_layer<S>(json_format: bool, level: Level) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
{
    let base = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_file(false);
    if json_format {
        base.json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        base.with_filter(LevelFilter::from_level(level)).boxed()
    }
}

fn file_layer<S>(config: &LoggingConfig, level: Level) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + 'static,
{
    let appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("twcbus")
        .filename_suffix("log")
        .max_log_files(config.backup_count.max(1) as usize)
        .build(log_dir(&config.file))
        .map_err(|e| BridgeError::io(format!("Failed to create log file appender: {}", e)))?;

    let (writer, guard) = non_blocking(appender);
    let _ = LOG_GUARD.set(guard);

    let base = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_ansi(false)
        .with_file(false);
    Ok(if config.json_format {
        base.json()
            .with_filter(LevelFilter::from_level(level))
            .boxed()
    } else {
        base.with_filter(LevelFilter::from_level(level)).boxed()
    })
}

/// Parse a configured level name; `WARNING` is accepted for `WARN`
pub fn parse_log_level(level_str: &str) -> Result<Level> {
    level_str
        .trim()
        .to_ascii_uppercase()
        .replace("WARNING", "WARN")
        .parse::<Level>()
        .map_err(|_| BridgeError::config(format!("Invalid log level: {}", level_str)))
}

/// Context information for log messages
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component name (e.g., "scheduler", "twc", "dbus")
    pub component: String,

    /// Device instance of the service the component works for
    pub device_instance: Option<u32>,

    /// Additional context fields
    pub extra_fields: Vec<(String, String)>,
}

impl LogContext {
    /// Create a new log context
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            device_instance: None,
            extra_fields: Vec::new(),
        }
    }

    /// Set device instance
    pub fn with_device_instance(mut self, device_instance: u32) -> Self {
        self.device_instance = Some(device_instance);
        self
    }

    /// Add extra field
    pub fn with_field(mut self, key: &str, value: String) -> Self {
        self.extra_fields.push((key.to_string(), value));
        self
    }
}

/// Structured logger with context
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context: LogContext,
}

impl StructuredLogger {
    /// Create a new structured logger with context
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    pub fn info(&self, message: &str) {
        let fields = self.format_fields();
        info!(%fields, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        let fields = self.format_fields();
        warn!(%fields, "{}", message);
    }

    pub fn error(&self, message: &str) {
        let fields = self.format_fields();
        error!(%fields, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        let fields = self.format_fields();
        debug!(%fields, "{}", message);
    }

    pub fn trace(&self, message: &str) {
        let fields = self.format_fields();
        trace!(%fields, "{}", message);
    }

    fn format_fields(&self) -> String {
        let mut fields = vec![format!("component={}", self.context.component)];

        if let Some(device_instance) = self.context.device_instance {
            fields.push(format!("device_instance={}", device_instance));
        }

        for (key, value) in &self.context.extra_fields {
            fields.push(format!("{}={}", key, value));
        }

        fields.join(",")
    }
}

/// Create a logger for a specific component
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

/// Create a logger with full context
pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_sink_levels_overrides() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            file_level: Some("DEBUG".to_string()),
            ..LoggingConfig::default()
        };
        let levels = SinkLevels::from_config(&config).unwrap();
        assert_eq!(levels.console, Level::WARN);
        assert_eq!(levels.file, Level::DEBUG);
        assert_eq!(levels.most_verbose(), Level::DEBUG);

        let bad = LoggingConfig {
            console_level: Some("chatty".to_string()),
            ..LoggingConfig::default()
        };
        assert!(SinkLevels::from_config(&bad).is_err());
    }

    #[test]
    fn test_log_dir_accepts_file_or_directory() {
        assert_eq!(log_dir("/var/log/twcbus"), Path::new("/var/log/twcbus"));
        assert_eq!(
            log_dir("/data/log/twcbus.log"),
            Path::new("/data/log")
        );
    }

    #[test]
    fn test_log_context_fields() {
        let logger = get_logger_with_context(
            LogContext::new("scheduler")
                .with_device_instance(42)
                .with_field("host", "10.0.0.7".to_string()),
        );
        assert_eq!(
            logger.format_fields(),
            "component=scheduler,device_instance=42,host=10.0.0.7"
        );
    }

    #[test]
    fn test_structured_logger_does_not_panic() {
        init_logging(&LoggingConfig::default()).ok();
        let logger = get_logger("test_component");
        logger.info("Test info message");
        logger.debug("Test debug message");
        logger.warn("Test warning message");
        logger.error("Test error message");
        assert_eq!(logger.context().component, "test_component");
    }
}
