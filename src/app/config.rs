use crate::buffer::BatchConfig;
use crate::domain::Credential;
use crate::pipeline::{OutletConfig, ReducerSet};
use crate::reliability::RetryPolicy;
use crate::sender::{ClientConfig, DEFAULT_ENDPOINT, USER_AGENT};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Output format of the process's own logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Metrics API endpoint URL
    #[arg(long, env = "METRICS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Capacity of each stage queue
    #[arg(long, env = "BUFFER_SIZE", default_value = "1024")]
    pub buffer_size: usize,

    /// Number of converter workers
    #[arg(long, env = "NUM_CONVERTERS", default_value = "4")]
    pub converters: usize,

    /// Number of outlet workers
    #[arg(long, env = "NUM_OUTLETS", default_value = "4")]
    pub outlets: usize,

    /// Retries after a failed post
    #[arg(long, env = "OUTLET_RETRIES", default_value = "2")]
    pub retries: u32,

    /// Pause between retries in milliseconds (0 retries immediately)
    #[arg(long, env = "OUTLET_RETRY_DELAY_MS", default_value = "0")]
    pub retry_delay_ms: u64,

    /// Payloads per request
    #[arg(long, env = "BATCH_CAPACITY", default_value = "300")]
    pub batch_capacity: usize,

    /// Flush interval in milliseconds
    #[arg(long, env = "FLUSH_INTERVAL_MS", default_value = "200")]
    pub flush_interval_ms: u64,

    /// Connect and request timeout in milliseconds
    #[arg(long, env = "HTTP_TIMEOUT_MS", default_value = "2000")]
    pub http_timeout_ms: u64,

    /// Seconds between queue depth reports
    #[arg(long, env = "REPORT_INTERVAL_SECS", default_value = "2")]
    pub report_interval_secs: u64,

    /// Bucket window length in seconds
    #[arg(long, env = "BUCKET_RESOLUTION_SECS", default_value = "60")]
    pub resolution_secs: u64,

    /// Comma separated reducers (min,max,sum,count,mean,last,median,perc95,perc99)
    #[arg(long, env = "REDUCERS", default_value = "mean")]
    pub reducers: String,

    /// Metrics API user
    #[arg(long, env = "METRICS_USER")]
    pub user: Option<String>,

    /// Metrics API password or token
    #[arg(long, env = "METRICS_PASS", hide_env_values = true)]
    pub pass: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info", ignore_case = true)]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "text", ignore_case = true)]
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter
    #[arg(long, env = "ENABLE_METRICS")]
    pub enable_metrics: bool,

    /// Prometheus exporter port
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    pub metrics_port: u16,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub reducer_set: ReducerSet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            buffer_size: 1024,
            converters: 4,
            outlets: 4,
            retries: 2,
            retry_delay_ms: 0,
            batch_capacity: 300,
            flush_interval_ms: 200,
            http_timeout_ms: 2000,
            report_interval_secs: 2,
            resolution_secs: 60,
            reducers: "mean".to_string(),
            user: None,
            pass: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            enable_metrics: false,
            metrics_port: 9090,
            config_file: None,
            reducer_set: ReducerSet::default(),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the command line; when `--config-file` is given, the file
    /// supplies the settings and the command line only fills in missing
    /// credentials.
    pub fn load<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Config::parse_from(args);
        let Some(path) = cli.config_file.clone() else {
            let mut config = cli;
            config.post_process()?;
            config.validate()?;
            return Ok(config);
        };

        let mut config = Self::from_file(&path)?;
        config.config_file = Some(path);
        if config.user.is_none() {
            config.user = cli.user;
        }
        if config.pass.is_none() {
            config.pass = cli.pass;
        }
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        load_env_string("METRICS_ENDPOINT", &mut config.endpoint);
        load_env_var("BUFFER_SIZE", &mut config.buffer_size)?;
        load_env_var("NUM_CONVERTERS", &mut config.converters)?;
        load_env_var("NUM_OUTLETS", &mut config.outlets)?;
        load_env_var("OUTLET_RETRIES", &mut config.retries)?;
        load_env_var("OUTLET_RETRY_DELAY_MS", &mut config.retry_delay_ms)?;
        load_env_var("BATCH_CAPACITY", &mut config.batch_capacity)?;
        load_env_var("FLUSH_INTERVAL_MS", &mut config.flush_interval_ms)?;
        load_env_var("HTTP_TIMEOUT_MS", &mut config.http_timeout_ms)?;
        load_env_var("REPORT_INTERVAL_SECS", &mut config.report_interval_secs)?;
        load_env_var("BUCKET_RESOLUTION_SECS", &mut config.resolution_secs)?;
        load_env_string("REDUCERS", &mut config.reducers);
        load_env_string_opt("METRICS_USER", &mut config.user);
        load_env_string_opt("METRICS_PASS", &mut config.pass);
        load_env_enum("LOG_LEVEL", &mut config.log_level)?;
        load_env_enum("LOG_FORMAT", &mut config.log_format)?;
        load_env_var("ENABLE_METRICS", &mut config.enable_metrics)?;
        load_env_var("METRICS_PORT", &mut config.metrics_port)?;

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.reducer_set = self
            .reducers
            .parse()
            .map_err(|e| ConfigError::InvalidConfig(format!("{e}")))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {}", self.endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "Endpoint must use http or https: {}",
                self.endpoint
            )));
        }

        let positive = [
            ("Buffer size", self.buffer_size as u64),
            ("Converter count", self.converters as u64),
            ("Outlet count", self.outlets as u64),
            ("Batch capacity", self.batch_capacity as u64),
            ("Flush interval", self.flush_interval_ms),
            ("HTTP timeout", self.http_timeout_ms),
            ("Report interval", self.report_interval_secs),
            ("Bucket resolution", self.resolution_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.reducer_set.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "At least one reducer must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// The account every ingested line is delivered to.
    pub fn credential(&self) -> Result<Credential, ConfigError> {
        match (&self.user, &self.pass) {
            (Some(user), Some(pass)) if !user.is_empty() => {
                Ok(Credential::new(user.clone(), pass.clone()))
            }
            _ => Err(ConfigError::InvalidConfig(
                "Metrics credentials not configured (set METRICS_USER and METRICS_PASS)"
                    .to_string(),
            )),
        }
    }

    pub fn resolution(&self) -> Duration {
        Duration::from_secs(self.resolution_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_delay(self.retries, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn outlet_config(&self) -> OutletConfig {
        OutletConfig {
            converters: self.converters,
            outlets: self.outlets,
            buffer_size: self.buffer_size,
            batch: BatchConfig {
                max_size: self.batch_capacity,
                flush_interval: self.flush_interval(),
            },
            retry: self.retry_policy(),
            client: ClientConfig {
                endpoint: self.endpoint.clone(),
                connection_timeout: self.http_timeout(),
                timeout: self.http_timeout(),
                keep_alive: false,
                user_agent: USER_AGENT.to_string(),
            },
            reducers: self.reducer_set,
            report_interval: Duration::from_secs(self.report_interval_secs),
        }
    }
}

/// Helper function to load and parse an environment variable.
/// Returns Ok(()) if the variable doesn't exist (keeps default).
fn load_env_var<T>(name: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(name) {
        *target = value
            .parse()
            .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

/// Case-insensitive parse of a clap value enum.
fn load_env_enum<T: ValueEnum>(name: &str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(name) {
        *target = T::from_str(&value, true)
            .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

fn load_env_string_opt(name: &str, target: &mut Option<String>) {
    if let Ok(value) = std::env::var(name) {
        *target = Some(value);
    }
}

fn load_env_string(name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(name) {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Reducer;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = Config::from_args(["rask-log-metrics"]).unwrap();
        let default = Config::default();
        assert_eq!(config.endpoint, default.endpoint);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.converters, 4);
        assert_eq!(config.outlets, 4);
        assert_eq!(config.retries, 2);
        assert_eq!(config.batch_capacity, 300);
        assert_eq!(config.flush_interval(), Duration::from_millis(200));
        assert_eq!(config.http_timeout(), Duration::from_secs(2));
        assert_eq!(config.reducer_set, ReducerSet::default());
    }

    #[test]
    fn test_outlet_config_mapping() {
        let config = Config::from_args([
            "rask-log-metrics",
            "--retries",
            "5",
            "--retry-delay-ms",
            "100",
            "--reducers",
            "mean,perc99",
            "--http-timeout-ms",
            "750",
        ])
        .unwrap();
        let outlet = config.outlet_config();
        assert_eq!(outlet.retry.max_attempts(), 6);
        assert_eq!(outlet.retry.delay(), Duration::from_millis(100));
        assert!(outlet.reducers.is_enabled(Reducer::P99));
        assert!(!outlet.reducers.is_enabled(Reducer::Count));
        assert_eq!(outlet.client.timeout, Duration::from_millis(750));
        assert_eq!(outlet.client.connection_timeout, Duration::from_millis(750));
        assert!(!outlet.client.keep_alive);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases: [&[&str]; 4] = [
            &["rask-log-metrics", "--outlets", "0"],
            &["rask-log-metrics", "--batch-capacity", "0"],
            &["rask-log-metrics", "--endpoint", "ftp://example.com/metrics"],
            &["rask-log-metrics", "--reducers", "mean,bogus"],
        ];
        for args in cases {
            assert!(Config::from_args(args.iter().copied()).is_err(), "{args:?}");
        }
    }

    #[test]
    fn test_credential_requires_user_and_pass() {
        let mut config = Config::default();
        assert!(config.credential().is_err());

        config.user = Some("u".to_string());
        config.pass = Some("p".to_string());
        assert_eq!(config.credential().unwrap(), Credential::new("u", "p"));
    }
}
