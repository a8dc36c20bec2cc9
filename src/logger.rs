use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::{Config, Environment};

static CONSOLE_LOGGER: Lazy<ConsoleLogger> = Lazy::new(ConsoleLogger::new);

const REQUEST_PREFIX: &str = "[req:";

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_level_filter();
    CONSOLE_LOGGER.update_config(config);

    if let Err(e) = log::set_logger(&*CONSOLE_LOGGER) {
        return Err(format!("Failed to set logger: {:?}", e));
    }

    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub file: String,
    pub line: u32,
}

impl LogEntry {
    /// Splits a leading `[req:<id>] ` tag off the message into `request_id`.
    pub fn new(level: LogLevel, message: String, module: String, file: String, line: u32) -> Self {
        let (request_id, message) = split_request_tag(message);
        Self {
            timestamp: Utc::now(),
            level,
            message,
            module,
            request_id,
            file,
            line,
        }
    }
}

fn split_request_tag(message: String) -> (Option<String>, String) {
    if let Some(rest) = message.strip_prefix(REQUEST_PREFIX) {
        if let Some((id, tail)) = rest.split_once(']') {
            return (Some(id.to_string()), tail.trim_start().to_string());
        }
    }
    (None, message)
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_file_location: bool,
    pub show_module: bool,
    pub timestamp_format: String,
    pub output_json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_file_location: false,
            show_module: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    /// JSON lines at info, no colors: what a log collector wants.
    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            show_emojis: false,
            output_json: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_file_location: true,
            ..Default::default()
        }
    }

    /// Preset for `environment`, with `LOG_LEVEL` overriding the level.
    pub fn for_environment(environment: Environment) -> Self {
        let config = match environment {
            Environment::Development => Self::development(),
            Environment::Production => Self::production(),
        };
        match std::env::var("LOG_LEVEL").ok().and_then(|v| LogLevel::parse(&v)) {
            Some(level) => config.with_level(level),
            None => config,
        }
    }
}

pub struct ConsoleLogger {
    config: Mutex<LoggerConfig>,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
        }
    }

    pub fn update_config(&self, new_config: LoggerConfig) {
        if let Ok(mut config) = self.config.lock() {
            *config = new_config;
        }
    }

    fn format_console_output(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        let mut output = String::new();

        let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
        if config.show_colors {
            output.push_str(&format!("{} ", timestamp.bright_black()));
        } else {
            output.push_str(&format!("{} ", timestamp));
        }

        let level_str = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };
        if config.show_colors {
            output.push_str(&format!(
                "[{}] ",
                level_str.color(entry.level.color()).bold()
            ));
        } else {
            output.push_str(&format!("[{}] ", level_str));
        }

        if let Some(request_id) = &entry.request_id {
            if config.show_colors {
                output.push_str(&format!("[req:{}] ", request_id.bright_yellow()));
            } else {
                output.push_str(&format!("[req:{}] ", request_id));
            }
        }

        if config.show_module && !entry.module.is_empty() {
            if config.show_colors {
                output.push_str(&format!("{}: ", entry.module.bright_blue()));
            } else {
                output.push_str(&format!("{}: ", entry.module));
            }
        }

        output.push_str(&entry.message);

        if config.show_file_location {
            let location = format!("{}:{}", entry.file, entry.line);
            if config.show_colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }

        output
    }

    fn create_log_entry(&self, record: &Record) -> LogEntry {
        LogEntry::new(
            LogLevel::from_log_level(record.level()),
            record.args().to_string(),
            record.module_path().unwrap_or("unknown").to_string(),
            record.file().unwrap_or("unknown").to_string(),
            record.line().unwrap_or(0),
        )
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => LogLevel::from_log_level(metadata.level()) >= config.min_level,
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = self.create_log_entry(record);

        if let Ok(config) = self.config.lock() {
            let line = if config.output_json {
                serde_json::to_string(&entry).unwrap_or_default()
            } else {
                self.format_console_output(&entry, &config)
            };
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let _ = writeln!(handle, "{}", line);
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Per-request log scope. Every line it emits carries the request id, and
/// dropping it logs how long the request took.
pub struct RequestLog {
    id: String,
    name: String,
    start: Instant,
}

impl RequestLog {
    pub fn new(name: &str) -> Self {
        let id = Uuid::new_v4().simple().to_string()[..12].to_string();
        let scope = Self {
            id,
            name: name.to_string(),
            start: Instant::now(),
        };
        scope.debug(&format!("{} started", scope.name));
        scope
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn debug(&self, message: &str) {
        log::debug!("{}{}] {}", REQUEST_PREFIX, self.id, message);
    }

    pub fn info(&self, message: &str) {
        log::info!("{}{}] {}", REQUEST_PREFIX, self.id, message);
    }

    pub fn warn(&self, message: &str) {
        log::warn!("{}{}] {}", REQUEST_PREFIX, self.id, message);
    }

    pub fn error(&self, message: &str) {
        log::error!("{}{}] {}", REQUEST_PREFIX, self.id, message);
    }
}

impl Drop for RequestLog {
    fn drop(&mut self) {
        log::info!(
            "{}{}] {} finished in {}ms",
            REQUEST_PREFIX,
            self.id,
            self.name,
            self.elapsed().as_millis()
        );
    }
}

pub fn log_startup_info(app_name: &str, version: &str, config: &Config) {
    log::info!("🚀 Starting {} v{}", app_name, version);
    log::info!("🌐 Listening on http://{}:{}", config.host, config.port);
    log::info!("🔗 Health check: http://{}:{}/api/health", config.host, config.port);
}

/// Logs the effective configuration. Keys are reported as present or not,
/// never by value.
pub fn log_config_info(config: &Config) {
    let flag = |present: bool| if present { "✅" } else { "❌" };
    let volc = &config.volcengine;

    log::info!("⚙️  Configuration loaded:");
    log::info!("   Environment: {}", config.environment.as_str());
    log::info!("   Volcengine endpoint: {} ({})", volc.endpoint, volc.region);
    log::info!("   Access key: {}", flag(volc.has_access_key()));
    log::info!("   Secret key: {}", flag(volc.has_secret_key()));
    log::info!(
        "   Polling: every {}ms, up to {} attempts, {}ms per call",
        volc.poll_interval.as_millis(),
        volc.max_poll_attempts,
        volc.timeout.as_millis()
    );
    log::info!("   CORS origins: {}", config.allowed_origins.join(", "));

    if !volc.has_credentials() {
        log::warn!("⚠️  Volcengine API keys are not configured; generation requests will fail");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_logger_config_presets() {
        let config = LoggerConfig::development();
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.show_colors);

        let prod_config = LoggerConfig::production();
        assert!(!prod_config.show_colors);
        assert!(prod_config.output_json);
    }

    #[test]
    fn test_request_tag_is_split_into_entry() {
        let entry = LogEntry::new(
            LogLevel::Info,
            "[req:abc123] polling task T1".to_string(),
            "stalkgen::service".to_string(),
            "src/service.rs".to_string(),
            10,
        );
        assert_eq!(entry.request_id.as_deref(), Some("abc123"));
        assert_eq!(entry.message, "polling task T1");

        let plain = LogEntry::new(
            LogLevel::Info,
            "no tag here".to_string(),
            String::new(),
            String::new(),
            0,
        );
        assert!(plain.request_id.is_none());
        assert_eq!(plain.message, "no tag here");
    }

    #[test]
    fn test_plain_console_format() {
        let logger = ConsoleLogger::new();
        let config = LoggerConfig::new().with_colors(false);
        let config = LoggerConfig {
            show_emojis: false,
            ..config
        };
        let entry = LogEntry::new(
            LogLevel::Warn,
            "[req:r1] retrying".to_string(),
            "stalkgen::volcengine".to_string(),
            "src/volcengine/poller.rs".to_string(),
            42,
        );

        let line = logger.format_console_output(&entry, &config);
        assert!(line.ends_with("[WARN] [req:r1] stalkgen::volcengine: retrying"), "{}", line);
    }

    #[test]
    fn test_request_log_ids_are_unique() {
        let a = RequestLog::new("a");
        let b = RequestLog::new("b");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().len(), 12);
    }

    #[test]
    fn test_logger_initialization() {
        let config = LoggerConfig::development();
        // Another test may already have installed the global logger.
        let _ = init_with_config(config);
    }
}
