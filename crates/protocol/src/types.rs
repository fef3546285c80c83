use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Result};

pub const MAX_SESSION_ID_LEN: usize = 64;

/// Placeholder shown when no probe revealed the hotel name.
pub const UNKNOWN_HOTEL: &str = "Unknown hotel";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConvertRequest {
    pub url: String,
    pub session_id: String,
}

impl SessionConvertRequest {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ProtocolError::MissingField("url".to_string()));
        }
        validate_session_id(&self.session_id)
    }
}

/// Session ids are client generated; keep them short and URL safe.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty() {
        return Err(ProtocolError::MissingField("sessionId".to_string()));
    }
    if session_id.len() > MAX_SESSION_ID_LEN
        || !session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ProtocolError::InvalidFormat(format!(
            "sessionId must be 1-{MAX_SESSION_ID_LEN} characters of [A-Za-z0-9_-]"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SessionAck {
    pub fn accepted() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedEntry {
    pub label: String,
    pub cid: u64,
    pub url: String,
    pub hotel_name: Option<String>,
    pub price: Option<f64>,
    pub sold_out: bool,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<PriceTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub hotel: String,
    pub initial_price: Option<f64>,
    pub priced: Vec<PricedEntry>,
    pub cheapest: Option<PricedEntry>,
    pub total_probed: usize,
    pub found_count: usize,
    pub sold_out_count: usize,
    pub failed_count: usize,
    pub affiliate_links: Vec<AffiliateLink>,
}

/// Messages pushed on a session's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    Progress {
        percentage: u8,
        settled: usize,
        total: usize,
    },
    Complete {
        result: Box<ConvertResponse>,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn progress(settled: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            (settled.min(total) * 100 / total) as u8
        };
        ProgressEvent::Progress {
            percentage,
            settled,
            total,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Progress { .. })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}
