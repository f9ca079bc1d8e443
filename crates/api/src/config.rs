//! Application configuration loaded from environment variables.

use std::collections::BTreeSet;
use std::time::Duration;

use fulfillment::FulfillmentSettings;
use pipeline::ExecutorConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for human-readable
/// - `DATABASE_URL`: PostgreSQL audit store; unset keeps audits in memory
/// - `HANDLER_TIMEOUT_MS`: per-handler time limit; unset means none
/// - `ACCOUNTING_EXPORT_PATH`: remote path of the accounting export
/// - `LABELS_DIR`: remote directory for shipping labels
/// - `DISABLED_HANDLERS`: comma-separated handler names to switch off
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub handler_timeout: Option<Duration>,
    pub accounting_export_path: String,
    pub labels_dir: String,
    pub disabled_handlers: BTreeSet<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            handler_timeout: lookup("HANDLER_TIMEOUT_MS")
                .and_then(|ms| ms.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            accounting_export_path: lookup("ACCOUNTING_EXPORT_PATH")
                .unwrap_or(defaults.accounting_export_path),
            labels_dir: lookup("LABELS_DIR").unwrap_or(defaults.labels_dir),
            disabled_handlers: lookup("DISABLED_HANDLERS")
                .map(|names| {
                    names
                        .split(',')
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        let config = ExecutorConfig::new();
        match self.handler_timeout {
            Some(timeout) => config.handler_timeout(timeout),
            None => config,
        }
    }

    pub fn fulfillment_settings(&self) -> FulfillmentSettings {
        FulfillmentSettings {
            accounting_export_path: self.accounting_export_path.clone(),
            labels_dir: self.labels_dir.clone(),
            disabled_handlers: self.disabled_handlers.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let settings = FulfillmentSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            handler_timeout: None,
            accounting_export_path: settings.accounting_export_path,
            labels_dir: settings.labels_dir,
            disabled_handlers: settings.disabled_handlers,
        }
    }
}
