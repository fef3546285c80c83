//! Vendor page parsing: locating the data endpoint and reading the room offer.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::{FetchError, Outcome, ProbeError, Result};

pub struct OfferExtractor {
    init_script: Selector,
    api_url: Regex,
}

impl OfferExtractor {
    pub fn new(init_script_selector: &str) -> Result<Self> {
        let init_script = Selector::parse(init_script_selector).map_err(|e| {
            ProbeError::InvalidConfig(format!("selector {init_script_selector:?}: {e}"))
        })?;
        let api_url = Regex::new(r#"apiUrl\s*=\s*"(.+?)""#)
            .map_err(|e| ProbeError::InvalidConfig(e.to_string()))?;

        Ok(Self { init_script, api_url })
    }

    /// Pulls the data endpoint path out of the page's init-param script.
    pub fn api_path(&self, html: &str) -> std::result::Result<String, FetchError> {
        let document = Html::parse_document(html);
        let script = document
            .select(&self.init_script)
            .next()
            .ok_or(FetchError::MissingInitScript)?;
        let text = script.text().collect::<String>();

        let path = self
            .api_url
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace("&amp;", "&"))
            .ok_or(FetchError::MissingApiUrl)?;

        debug!("Found data endpoint {}", path);
        Ok(path)
    }

    /// Reads hotel name and first-room price from the data endpoint payload.
    pub fn offer(&self, json: &Value) -> std::result::Result<Outcome, FetchError> {
        let hotel_name = json
            .pointer("/hotelInfo/name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let first_room = match json.get("rooms").and_then(Value::as_array) {
            Some(rooms) if !rooms.is_empty() => &rooms[0],
            _ => return Ok(Outcome::SoldOut { hotel_name }),
        };

        let price = first_room
            .pointer("/directPrice/originalPrice")
            .and_then(Value::as_f64)
            .ok_or(FetchError::MissingPrice)?;

        if !(price.is_finite() && price > 0.0) {
            return Err(FetchError::NonPositivePrice(price));
        }

        Ok(Outcome::Priced { hotel_name, price })
    }
}

impl Default for OfferExtractor {
    fn default() -> Self {
        Self::new(crate::DEFAULT_INIT_SCRIPT_SELECTOR).expect("default selector is valid")
    }
}
