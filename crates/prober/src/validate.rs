use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{IdentifierTemplate, ProbeError, ProberConfig, Result};

/// Why a target URL was refused before any probing started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("no URL given")]
    Missing,

    #[error("not an absolute http(s) URL")]
    Unparseable,

    #[error("host {0} is not on the vendor domain")]
    ForeignHost(String),

    #[error("search and listing pages cannot be probed")]
    ListingPage,

    #[error("missing {0} parameter")]
    MissingIdentifier(String),
}

#[derive(Debug, Clone)]
pub struct TargetValidator {
    vendor_domain: String,
    excluded_paths: Vec<Regex>,
    template: IdentifierTemplate,
}

impl TargetValidator {
    pub fn from_config(config: &ProberConfig) -> Result<Self> {
        let excluded_paths = config
            .excluded_paths
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    ProbeError::InvalidConfig(format!("excluded path {pattern:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            vendor_domain: config.vendor_domain.to_lowercase(),
            excluded_paths,
            template: IdentifierTemplate::new(&config.identifier_param)?,
        })
    }

    pub fn validate(&self, url: Option<&str>) -> std::result::Result<Url, Rejection> {
        let raw = url.map(str::trim).filter(|u| !u.is_empty()).ok_or(Rejection::Missing)?;

        let parsed = Url::parse(raw).map_err(|_| Rejection::Unparseable)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Rejection::Unparseable);
        }

        let host = parsed.host_str().ok_or(Rejection::Unparseable)?.to_lowercase();
        if !self.is_vendor_host(&host) {
            return Err(Rejection::ForeignHost(host));
        }

        if self.excluded_paths.iter().any(|re| re.is_match(parsed.path())) {
            return Err(Rejection::ListingPage);
        }

        if !self.template.has_marker(raw) {
            return Err(Rejection::MissingIdentifier(self.template.param().to_string()));
        }

        debug!("Accepted target {}", raw);
        Ok(parsed)
    }

    pub fn is_valid(&self, url: Option<&str>) -> bool {
        self.validate(url).is_ok()
    }

    fn is_vendor_host(&self, host: &str) -> bool {
        host == self.vendor_domain
            || host
                .strip_suffix(self.vendor_domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

fn default_validator() -> Option<&'static TargetValidator> {
    static DEFAULT: OnceLock<Option<TargetValidator>> = OnceLock::new();

    DEFAULT
        .get_or_init(|| TargetValidator::from_config(&ProberConfig::default()).ok())
        .as_ref()
}

/// Checks `url` against the default vendor rules.
pub fn is_valid_target_url(url: Option<&str>) -> bool {
    default_validator().is_some_and(|validator| validator.is_valid(url))
}

/// Like [`is_valid_target_url`], reporting why a URL was refused.
pub fn validate_target_url(url: Option<&str>) -> Result<Url> {
    let validator = default_validator()
        .ok_or_else(|| ProbeError::InvalidConfig("default validator unavailable".to_string()))?;
    Ok(validator.validate(url)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TargetValidator {
        TargetValidator::from_config(&ProberConfig::default()).unwrap()
    }

    #[test]
    fn test_accepts_property_page() {
        assert!(is_valid_target_url(Some(
            "https://www.agoda.com/ko-kr/grand-hotel/hotel/seoul-kr.html?cid=-1&los=1"
        )));
        assert!(is_valid_target_url(Some(
            "https://agoda.com/hotel/x.html?checkIn=2025-01-01&cid=1844104"
        )));
    }

    #[test]
    fn test_rejections() {
        let v = validator();
        assert_eq!(v.validate(None), Err(Rejection::Missing));
        assert_eq!(v.validate(Some("   ")), Err(Rejection::Missing));
        assert_eq!(v.validate(Some("agoda.com/hotel?cid=1")), Err(Rejection::Unparseable));
        assert_eq!(
            v.validate(Some("ftp://www.agoda.com/hotel?cid=1")),
            Err(Rejection::Unparseable)
        );
        assert_eq!(
            v.validate(Some("https://www.booking.com/hotel.html?cid=1")),
            Err(Rejection::ForeignHost("www.booking.com".to_string()))
        );
        assert_eq!(
            v.validate(Some("https://www.agoda.com/search?city=14690&cid=-1")),
            Err(Rejection::ListingPage)
        );
        assert_eq!(
            v.validate(Some("https://www.agoda.com/hotel/x.html?los=2")),
            Err(Rejection::MissingIdentifier("cid".to_string()))
        );
    }

    #[test]
    fn test_identifier_only_in_fragment_rejected() {
        let url = "https://www.agoda.com/ko-kr/grand/hotel/seoul-kr.html?los=1#rooms&cid=-1";
        assert!(!is_valid_target_url(Some(url)));
        assert_eq!(
            validator().validate(Some(url)),
            Err(Rejection::MissingIdentifier("cid".to_string()))
        );
    }

    #[test]
    fn test_lookalike_domain_rejected() {
        assert!(!is_valid_target_url(Some("https://notagoda.com/hotel/x.html?cid=-1")));
        assert!(!is_valid_target_url(Some("https://agoda.com.evil.io/hotel/x.html?cid=-1")));
    }

    #[test]
    fn test_validate_target_url_reports_reason() {
        let url = validate_target_url(Some("https://www.agoda.com/hotel/x.html?cid=-1")).unwrap();
        assert_eq!(url.host_str(), Some("www.agoda.com"));

        let err = validate_target_url(Some("https://www.agoda.com/search?cid=1")).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidTarget(Rejection::ListingPage)));
    }

    #[test]
    fn test_custom_vendor() {
        let config = ProberConfig::default().with_vendor_domain("127.0.0.1");
        let v = TargetValidator::from_config(&config).unwrap();
        assert!(v.is_valid(Some("http://127.0.0.1:8080/hotel/a.html?cid=-1")));
    }
}
