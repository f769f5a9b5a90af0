//! Gateway configuration
//!
//! Every setting is a command-line flag backed by an environment variable, so
//! a `.env` file (loaded by `main` through `dotenvy`) is enough to run the
//! gateway.

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::services::open_meteo::{DEFAULT_FORECAST_URL, DEFAULT_GEOCODING_URL};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid host address '{0}'")]
    InvalidHost(String),

    #[error("Invalid {name} URL '{value}': {reason}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "weather-mcp-gateway")]
#[command(about = "MCP gateway exposing weather tools over streamable HTTP", long_about = None)]
pub struct GatewayConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// JSON file with the local city dataset
    #[arg(long, env = "CITIES_DATASET", default_value = "data/cities.json")]
    pub cities_dataset: PathBuf,

    #[arg(long, env = "OPEN_METEO_FORECAST_URL", default_value = DEFAULT_FORECAST_URL)]
    pub forecast_url: String,

    #[arg(long, env = "OPEN_METEO_GEOCODING_URL", default_value = DEFAULT_GEOCODING_URL)]
    pub geocoding_url: String,

    /// Language for geocoding results
    #[arg(long, env = "GEOCODING_LANGUAGE", default_value = "fr")]
    pub geocoding_language: String,

    /// Timeout for outbound Open-Meteo requests, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Close sessions idle for this many seconds (disabled when unset)
    #[arg(long, env = "SESSION_IDLE_TIMEOUT_SECS")]
    pub session_idle_timeout_secs: Option<u64>,
}

impl GatewayConfig {
    /// Check the values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        check_url("forecast", &self.forecast_url)?;
        check_url("geocoding", &self.geocoding_url)?;
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("HTTP_TIMEOUT_SECS"));
        }
        if self.session_idle_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroDuration("SESSION_IDLE_TIMEOUT_SECS"));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.host.clone()))?;
        Ok(SocketAddr::from((ip, self.port)))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn session_idle_timeout(&self) -> Option<Duration> {
        self.session_idle_timeout_secs.map(Duration::from_secs)
    }
}

fn check_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
