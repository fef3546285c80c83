use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ProbeError, Result};

pub const DEFAULT_INIT_SCRIPT_SELECTOR: &str = r#"script[data-selenium="script-initparam"]"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProberConfig {
    pub user_agent: String,
    /// Hosts equal to this domain or below it are accepted as targets.
    pub vendor_domain: String,
    /// Query parameter carrying the referral identifier.
    pub identifier_param: String,
    /// Regex patterns matched against the URL path; a match marks a listing page.
    pub excluded_paths: Vec<String>,
    pub page_timeout: Duration,
    pub api_timeout: Duration,
    pub max_redirects: u32,
    pub headers: Vec<(String, String)>,
    /// Origin the data endpoint path is resolved against. `None` uses the probe URL's origin.
    pub api_base: Option<String>,
    pub init_script_selector: String,
    pub concurrency_limit: usize,
    pub batch_delay: Duration,
    /// Fetch the unmodified URL before the batch for the initial price and a fallback name.
    pub baseline_lookup: bool,
    pub rate_limit: Option<RateLimitConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst_size: u32,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            vendor_domain: "agoda.com".to_string(),
            identifier_param: "cid".to_string(),
            excluded_paths: vec!["/search".to_string()],
            page_timeout: Duration::from_secs(10),
            api_timeout: Duration::from_secs(8),
            max_redirects: 5,
            headers: vec![
                ("Accept-Language".to_string(), "ko,ko-KR;q=0.9,en-US;q=0.8,en;q=0.7".to_string()),
                ("ag-language-locale".to_string(), "ko-kr".to_string()),
            ],
            api_base: None,
            init_script_selector: DEFAULT_INIT_SCRIPT_SELECTOR.to_string(),
            concurrency_limit: 25,
            batch_delay: Duration::from_millis(300),
            baseline_lookup: true,
            rate_limit: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 20.0,
            burst_size: 10,
        }
    }
}

impl ProberConfig {
    pub fn aggressive() -> Self {
        Self {
            concurrency_limit: 75,
            batch_delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    pub fn polite() -> Self {
        Self {
            concurrency_limit: 8,
            batch_delay: Duration::from_secs(1),
            rate_limit: Some(RateLimitConfig {
                requests_per_second: 4.0,
                burst_size: 2,
            }),
            ..Default::default()
        }
    }

    pub fn with_vendor_domain(mut self, domain: impl Into<String>) -> Self {
        self.vendor_domain = domain.into();
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_timeouts(mut self, page: Duration, api: Duration) -> Self {
        self.page_timeout = page;
        self.api_timeout = api;
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.push((key, value));
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn without_baseline(mut self) -> Self {
        self.baseline_lookup = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(ProbeError::InvalidConfig(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }
        if self.identifier_param.is_empty() {
            return Err(ProbeError::InvalidConfig(
                "identifier_param must not be empty".to_string(),
            ));
        }
        if self.vendor_domain.is_empty() {
            return Err(ProbeError::InvalidConfig(
                "vendor_domain must not be empty".to_string(),
            ));
        }
        if let Some(rate_limit) = &self.rate_limit {
            if !(rate_limit.requests_per_second.is_finite() && rate_limit.requests_per_second > 0.0) {
                return Err(ProbeError::InvalidConfig(format!(
                    "requests_per_second must be positive, got {}",
                    rate_limit.requests_per_second
                )));
            }
            if rate_limit.burst_size == 0 {
                return Err(ProbeError::InvalidConfig(
                    "burst_size must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}
