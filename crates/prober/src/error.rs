use thiserror::Error;

use crate::{CatalogError, Rejection};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid target URL: {0}")]
    InvalidTarget(#[from] Rejection),

    #[error("URL has no identifier parameter to substitute: {0}")]
    MissingIdentifier(String),

    #[error("No identifiers to probe")]
    EmptyCatalog,

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProbeError {
    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProbeError::InvalidTarget(_) | ProbeError::MissingIdentifier(_))
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
