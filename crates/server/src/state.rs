use std::sync::Arc;
use std::time::Duration;

use cid_prober::{Catalog, Converter, Identifier};

use crate::{sse::SessionRegistry, Result, ServerConfig};

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub converter: Arc<Converter>,
    pub catalog: Arc<Catalog>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let catalog = config.load_catalog()?;
        let converter = Converter::new(config.prober.clone())?;
        Ok(Self::from_parts(config, converter, catalog))
    }

    pub fn from_parts(config: ServerConfig, converter: Converter, catalog: Catalog) -> Self {
        let sessions = SessionRegistry::new(Duration::from_secs(config.session_retention));
        Self {
            config: Arc::new(config),
            converter: Arc::new(converter),
            catalog: Arc::new(catalog),
            sessions: Arc::new(sessions),
        }
    }

    /// A fresh identifier set for one conversion.
    pub fn draw_identifiers(&self) -> Result<Vec<Identifier>> {
        let mut rng = rand::thread_rng();
        Ok(self.catalog.identifiers(&mut rng)?)
    }
}
