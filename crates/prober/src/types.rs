use serde::{Deserialize, Serialize};

use crate::{Cid, Identifier, IdentifierTemplate, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeCandidate {
    pub label: String,
    pub cid: Cid,
    pub url: String,
}

impl ProbeCandidate {
    pub fn from_identifier(
        template: &IdentifierTemplate,
        base_url: &str,
        identifier: &Identifier,
    ) -> Result<Self> {
        Ok(Self {
            label: identifier.label.clone(),
            cid: identifier.cid,
            url: template.apply(base_url, identifier.cid)?,
        })
    }
}

/// What a single probe produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Priced {
        hotel_name: Option<String>,
        price: f64,
    },
    SoldOut {
        hotel_name: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
        }
    }

    /// A usable price: finite and strictly positive.
    pub fn price(&self) -> Option<f64> {
        match self {
            Outcome::Priced { price, .. } if price.is_finite() && *price > 0.0 => Some(*price),
            _ => None,
        }
    }

    pub fn hotel_name(&self) -> Option<&str> {
        match self {
            Outcome::Priced { hotel_name, .. } | Outcome::SoldOut { hotel_name } => {
                hotel_name.as_deref()
            }
            Outcome::Failed { .. } => None,
        }
    }

    pub fn is_sold_out(&self) -> bool {
        matches!(self, Outcome::SoldOut { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub candidate: ProbeCandidate,
    pub outcome: Outcome,
}

impl ProbeResult {
    pub fn new(candidate: ProbeCandidate, outcome: Outcome) -> Self {
        Self { candidate, outcome }
    }

    pub fn label(&self) -> &str {
        &self.candidate.label
    }

    pub fn cid(&self) -> Cid {
        self.candidate.cid
    }

    pub fn url(&self) -> &str {
        &self.candidate.url
    }

    pub fn price(&self) -> Option<f64> {
        self.outcome.price()
    }

    pub fn hotel_name(&self) -> Option<&str> {
        self.outcome.hotel_name()
    }

    pub fn sold_out(&self) -> bool {
        self.outcome.is_sold_out()
    }

    pub fn failed(&self) -> bool {
        self.outcome.is_failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_prices() {
        for price in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let outcome = Outcome::Priced {
                hotel_name: None,
                price,
            };
            assert_eq!(outcome.price(), None, "price {price}");
        }
    }

    #[test]
    fn test_candidate_from_identifier() {
        let template = IdentifierTemplate::default();
        let candidate = ProbeCandidate::from_identifier(
            &template,
            "https://www.agoda.com/h.html?cid=-1",
            &Identifier::new("Visa", 1889319),
        )
        .unwrap();

        assert_eq!(candidate.url, "https://www.agoda.com/h.html?cid=1889319");
        assert_eq!(candidate.label, "Visa");
    }
}
