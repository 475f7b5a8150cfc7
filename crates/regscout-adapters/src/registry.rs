use crate::browser_page::BrowserPageAdapter;
use crate::error::Result;
use crate::http_json::HttpJsonAdapter;
use regscout_browser::{SessionManager, SessionOptions};
use regscout_core::{AppConfig, ProviderId, ProviderSource};
use regscout_provider::ProviderRegistry;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// Build adapters for every enabled provider in `config`.
///
/// Browser adapters share `sessions` and therefore its limiter; HTTP
/// adapters share `client`.
pub fn build_registry(
    config: &AppConfig,
    sessions: &SessionManager,
    client: &Client,
) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();

    for provider in config.enabled_providers() {
        match &provider.source {
            ProviderSource::HttpJson(source) => {
                let adapter = HttpJsonAdapter::new(provider.id, client.clone(), source.clone())?;
                registry.register(provider.id, Arc::new(adapter));
            }
            ProviderSource::BrowserPage(source) => {
                let options = session_options(config.browser.persistent_profile.as_deref(), provider.id);
                let adapter =
                    BrowserPageAdapter::new(provider.id, sessions.clone(), options, source.clone())?;
                registry.register(provider.id, Arc::new(adapter));
            }
        }
    }

    info!(providers = registry.len(), "provider adapters ready");
    Ok(registry)
}

// each provider keeps its own persistent profile so they never contend
fn session_options(persistent_profile: Option<&str>, provider: ProviderId) -> SessionOptions {
    match persistent_profile {
        Some(name) => SessionOptions::persistent(format!("{name}-{}", provider.as_str())),
        None => SessionOptions::ephemeral(),
    }
}
