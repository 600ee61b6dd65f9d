//! Serve command handler

use anyhow::{Result, bail};
use std::sync::Arc;

use super::ServeCommands;
use crate::cache::{Cache, MemoryCache};
use crate::config::{API_TOKEN_ENV, Config};
use crate::context::build_importer;
use crate::server::{self, AppState};

pub async fn handle_serve_command(args: ServeCommands, config: &Config) -> Result<()> {
    let Some(token) = config.server.api_token.as_deref().filter(|t| !t.is_empty()) else {
        bail!(
            "Refusing to serve without an API token; set server.api_token or {}",
            API_TOKEN_ENV
        );
    };

    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let importer = build_importer(config, Some(cache.clone())).await?;
    let bind = args.bind.as_deref().unwrap_or(&config.server.bind);

    server::serve(bind, AppState::new(importer, cache, token)).await
}
