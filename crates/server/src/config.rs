use cid_prober::{Catalog, ProberConfig, RandomSampling};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::{Result, ServerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub sse_keepalive_interval: u64,
    pub request_timeout: u64,
    pub max_request_size: usize,
    /// Seconds a finished session keeps its final event for late subscribers.
    pub session_retention: u64,
    pub catalog_path: Option<PathBuf>,
    /// Overrides the catalog's random sample size; `0` disables sampling.
    pub sample_size: Option<usize>,
    pub prober: ProberConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            sse_keepalive_interval: 15,
            request_timeout: 300,
            max_request_size: 64 * 1024,
            session_retention: 60,
            catalog_path: None,
            sample_size: None,
            prober: ProberConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CID_HOST") {
            config.host = host;
        }

        if let Some(port) = env_parse("CID_PORT") {
            config.port = port;
        }

        if let Some(limit) = env_parse("CID_CONCURRENCY") {
            config.prober.concurrency_limit = limit;
        }

        if let Some(delay) = env_parse("CID_BATCH_DELAY_MS") {
            config.prober.batch_delay = Duration::from_millis(delay);
        }

        if let Some(size) = env_parse("CID_SAMPLE_SIZE") {
            config.sample_size = Some(size);
        }

        if let Ok(path) = std::env::var("CID_CATALOG_PATH") {
            config.catalog_path = Some(PathBuf::from(path));
        }

        if let Ok(domain) = std::env::var("CID_VENDOR_DOMAIN") {
            config.prober.vendor_domain = domain;
        }

        config
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Config(format!("{}:{}: {e}", self.host, self.port)))
    }

    /// The catalog file if one is configured, otherwise the built-in list,
    /// with the sample size override applied.
    pub fn load_catalog(&self) -> Result<Catalog> {
        let catalog = match &self.catalog_path {
            Some(path) => Catalog::load(path)?,
            None => Catalog::default(),
        };

        let catalog = match self.sample_size {
            None => catalog,
            Some(0) => catalog.with_sampling(None),
            Some(sample_size) => {
                let sampling = catalog.sampling.clone().unwrap_or_default();
                catalog.with_sampling(Some(RandomSampling {
                    sample_size,
                    ..sampling
                }))
            }
        };

        Ok(catalog)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}
