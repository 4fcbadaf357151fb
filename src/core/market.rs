//! Cache-first quote lookups across all registered providers.

use crate::core::cache::QuoteCache;
use crate::core::quote::{AssetType, FetchError, FetchOutcome, QuoteProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct MarketData {
    cache: Arc<QuoteCache>,
    providers: HashMap<AssetType, Arc<dyn QuoteProvider>>,
}

impl MarketData {
    pub fn new(cache: Arc<QuoteCache>) -> Self {
        Self {
            cache,
            providers: HashMap::new(),
        }
    }

    /// Registers a provider for its asset type, replacing any previous one.
    pub fn with_provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.providers.insert(provider.asset_type(), provider);
        self
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn is_configured(&self, asset_type: AssetType) -> bool {
        self.providers
            .get(&asset_type)
            .is_some_and(|provider| provider.is_configured())
    }

    /// Returns a cached quote when fresh, otherwise asks the provider and
    /// caches a successful answer.
    pub async fn get_quote(&self, asset_type: AssetType, code: &str) -> FetchOutcome {
        let code = code.trim().to_uppercase();
        if let Some(cached) = self.cache.get(asset_type, &code).await {
            return Ok(cached);
        }

        let provider = self.providers.get(&asset_type).ok_or_else(|| {
            FetchError::config(format!("no provider registered for {asset_type}"))
        })?;

        debug!(%asset_type, %code, "Fetching quote from provider");
        match provider.fetch_quote(&code).await {
            Ok(quote) => {
                self.cache.put(asset_type, &code, quote.clone()).await;
                Ok(quote)
            }
            Err(e) => {
                warn!(%asset_type, %code, error = %e, "Quote fetch failed");
                Err(e)
            }
        }
    }
}
