use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{OfferExtractor, Outcome, ProbeError, ProberConfig, RequestLimiter, Result};

/// Why one probe produced no usable record. Never leaves the fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("Init-param script not found")]
    MissingInitScript,

    #[error("Data endpoint not referenced by init-param script")]
    MissingApiUrl,

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Data endpoint returned invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("First room has no price")]
    MissingPrice,

    #[error("First room price is not positive: {0}")]
    NonPositivePrice(f64),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Http(e) if e.is_timeout())
    }
}

/// Turns a probe URL into an outcome. Implementations never fail: every
/// error is folded into [`Outcome::Failed`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Outcome;
}

pub struct HttpPageFetcher {
    client: ReqwestClient,
    config: Arc<ProberConfig>,
    extractor: OfferExtractor,
    api_base: Option<Url>,
    limiter: Option<RequestLimiter>,
}

impl HttpPageFetcher {
    pub fn new(config: Arc<ProberConfig>) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();

        for (key, value) in &config.headers {
            headers.insert(
                reqwest::header::HeaderName::from_bytes(key.as_bytes())
                    .map_err(|e| ProbeError::InvalidConfig(e.to_string()))?,
                reqwest::header::HeaderValue::from_str(value)
                    .map_err(|e| ProbeError::InvalidConfig(e.to_string()))?,
            );
        }

        let client = ReqwestClient::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .connect_timeout(config.page_timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        let api_base = config.api_base.as_deref().map(Url::parse).transpose()?;
        let limiter = config
            .rate_limit
            .as_ref()
            .map(RequestLimiter::new)
            .transpose()?;
        let extractor = OfferExtractor::new(&config.init_script_selector)?;

        Ok(Self {
            client,
            config,
            extractor,
            api_base,
            limiter,
        })
    }

    /// The two-step lookup: page, then the data endpoint it names.
    pub async fn lookup(&self, url: &str) -> std::result::Result<Outcome, FetchError> {
        let page_url = Url::parse(url)?;
        let html = self.get_text(page_url.as_str(), self.config.page_timeout).await?;
        let api_path = self.extractor.api_path(&html)?;

        let base = self.api_base.as_ref().unwrap_or(&page_url);
        let api_url = base.join(&api_path)?;

        let body = self.get_text(api_url.as_str(), self.config.api_timeout).await?;
        let json: serde_json::Value = serde_json::from_str(&body)?;

        self.extractor.offer(&json)
    }

    async fn get_text(&self, url: &str, timeout: Duration) -> std::result::Result<String, FetchError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Outcome {
        match self.lookup(url).await {
            Ok(outcome) => {
                debug!(url, price = ?outcome.price(), sold_out = outcome.is_sold_out(), "Probe settled");
                outcome
            }
            Err(e) => {
                if e.is_timeout() {
                    warn!(url, "Probe timed out");
                } else {
                    debug!(url, error = %e, "Probe failed");
                }
                Outcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_rejected() {
        let config = ProberConfig::default().with_header("bad header".to_string(), "x".to_string());
        assert!(matches!(
            HttpPageFetcher::new(Arc::new(config)),
            Err(ProbeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_api_base_rejected() {
        let config = ProberConfig::default().with_api_base("not a url");
        assert!(matches!(
            HttpPageFetcher::new(Arc::new(config)),
            Err(ProbeError::UrlParse(_))
        ));
    }

    #[tokio::test]
    async fn test_unparseable_url_is_failed_outcome() {
        let fetcher = HttpPageFetcher::new(Arc::new(ProberConfig::default())).unwrap();
        assert!(fetcher.fetch("::not-a-url::").await.is_failed());
    }
}
