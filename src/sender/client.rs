use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://metrics-api.librato.com/v1/metrics";
pub const USER_AGENT: &str = concat!("rask-log-metrics/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Settings for the HTTP client used by the outlet workers.
///
/// Keep-alive is off by default: a slow peer holding a pooled connection
/// would otherwise stall every request queued behind it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    /// Limit for establishing the TCP/TLS connection.
    pub connection_timeout: Duration,
    /// Absolute limit for one request, from dial to the end of the response.
    pub timeout: Duration,
    pub keep_alive: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connection_timeout: Duration::from_secs(2),
            timeout: Duration::from_secs(2),
            keep_alive: false,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    pub client: Client,
    pub config: ClientConfig,
    pub endpoint_url: Url,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let endpoint_url: Url = config
            .endpoint
            .parse()
            .map_err(|e| ClientError::InvalidConfiguration(format!("Invalid endpoint URL: {e}")))?;

        let mut client_builder = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent);

        if !config.keep_alive {
            client_builder = client_builder.pool_max_idle_per_host(0);
        }

        let client = client_builder.build().map_err(|e| {
            ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            config,
            endpoint_url,
        })
    }
}
