use std::sync::Arc;

use crate::cache::Cache;
use crate::migration::Importer;

/// Shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub importer: Arc<Importer>,
    pub cache: Arc<dyn Cache>,
    /// Bearer token expected on `/api` routes
    pub api_token: Arc<str>,
}

impl AppState {
    pub fn new(importer: Importer, cache: Arc<dyn Cache>, api_token: &str) -> Self {
        Self {
            importer: Arc::new(importer),
            cache,
            api_token: Arc::from(api_token),
        }
    }
}
