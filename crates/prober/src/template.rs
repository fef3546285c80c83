//! Substitution of a referral identifier into a booking URL.

use regex::Regex;
use std::ops::Range;

use crate::{Cid, ProbeError, Result};

/// Identifier value meaning "no referral code assigned".
pub const SENTINEL: &str = "-1";

/// Where the identifier value sits inside a URL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Sentinel(Range<usize>),
    Numeric { span: Range<usize>, cid: Cid },
}

impl Marker {
    pub fn span(&self) -> Range<usize> {
        match self {
            Marker::Sentinel(span) => span.clone(),
            Marker::Numeric { span, .. } => span.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierTemplate {
    param: String,
    pattern: Regex,
}

impl IdentifierTemplate {
    pub fn new(param: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"[?&]{}=(-?\d+)", regex::escape(param)))
            .map_err(|e| ProbeError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            param: param.to_string(),
            pattern,
        })
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    /// Locates the value to replace: the first sentinel if there is one,
    /// otherwise the first non-negative integer value. Only the query string
    /// is searched; a fragment never reaches the server.
    pub fn find_marker(&self, url: &str) -> Option<Marker> {
        let query_end = url.find('#').unwrap_or(url.len());
        let scope = &url[..query_end];
        let query_start = scope.find('?')?;
        let mut first_numeric = None;

        for caps in self.pattern.captures_iter(scope) {
            let (whole, value) = match (caps.get(0), caps.get(1)) {
                (Some(whole), Some(value)) => (whole, value),
                _ => continue,
            };
            if whole.start() < query_start {
                continue;
            }

            // `cid=12abc` is not an identifier parameter.
            let terminated = scope[value.end()..]
                .chars()
                .next()
                .map_or(true, |c| c == '&');
            if !terminated {
                continue;
            }

            if value.as_str() == SENTINEL {
                return Some(Marker::Sentinel(value.range()));
            }

            if first_numeric.is_none() && !value.as_str().starts_with('-') {
                if let Ok(cid) = value.as_str().parse::<Cid>() {
                    first_numeric = Some(Marker::Numeric {
                        span: value.range(),
                        cid,
                    });
                }
            }
        }

        first_numeric
    }

    pub fn has_marker(&self, url: &str) -> bool {
        self.find_marker(url).is_some()
    }

    pub fn apply(&self, base_url: &str, cid: Cid) -> Result<String> {
        let span = self
            .find_marker(base_url)
            .ok_or_else(|| ProbeError::MissingIdentifier(base_url.to_string()))?
            .span();

        let mut out = String::with_capacity(base_url.len() + 8);
        out.push_str(&base_url[..span.start]);
        out.push_str(&cid.to_string());
        out.push_str(&base_url[span.end..]);
        Ok(out)
    }
}

impl Default for IdentifierTemplate {
    fn default() -> Self {
        Self {
            param: "cid".to_string(),
            pattern: Regex::new(r"[?&]cid=(-?\d+)").expect("static pattern"),
        }
    }
}

/// Builds a probe URL for `cid` using the default `cid` parameter.
pub fn build_probe_url(base_url: &str, cid: Cid) -> Result<String> {
    IdentifierTemplate::default().apply(base_url, cid)
}
