pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod converter;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod pacing;
pub mod prober;
pub mod template;
pub mod types;
pub mod validate;

pub use aggregate::*;
pub use catalog::*;
pub use config::*;
pub use converter::*;
pub use error::*;
pub use extractor::*;
pub use fetcher::*;
pub use pacing::*;
pub use prober::*;
pub use template::*;
pub use types::*;
pub use validate::*;
