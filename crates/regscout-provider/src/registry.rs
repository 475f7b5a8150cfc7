//! Startup-time mapping from provider identifiers to adapters.

use crate::adapter::{AdapterKind, ProviderAdapter};
use crate::error::{ProviderError, Result};
use regscout_core::ProviderId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Adapters keyed by `ProviderId`.
///
/// Built once at startup and shared read-only afterwards. Iteration order
/// follows `ProviderId`'s declaration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: BTreeMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for `id`.
    pub fn register(&mut self, id: ProviderId, adapter: Arc<dyn ProviderAdapter>) {
        debug!(provider = %id, kind = %adapter.kind(), "registering provider adapter");
        if self.adapters.insert(id, adapter).is_some() {
            warn!(provider = %id, "replaced previously registered adapter");
        }
    }

    /// Builder-style `register`.
    #[must_use]
    pub fn with(mut self, id: ProviderId, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(id, adapter);
        self
    }

    /// Get the adapter for `id`.
    ///
    /// # Errors
    /// Returns `ProviderError::NotRegistered` if no adapter was registered.
    pub fn get(&self, id: ProviderId) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&id)
            .cloned()
            .ok_or(ProviderError::NotRegistered(id))
    }

    /// Whether `id` has an adapter.
    #[must_use]
    pub fn contains(&self, id: ProviderId) -> bool {
        self.adapters.contains_key(&id)
    }

    /// Resource class of the adapter for `id`, if registered.
    #[must_use]
    pub fn kind_of(&self, id: ProviderId) -> Option<AdapterKind> {
        self.adapters.get(&id).map(|adapter| adapter.kind())
    }

    /// Every registered provider.
    #[must_use]
    pub fn ids(&self) -> Vec<ProviderId> {
        self.adapters.keys().copied().collect()
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.adapters
                    .iter()
                    .map(|(id, adapter)| (id.as_str(), adapter.kind())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ProviderResult;
    use regscout_core::DomainName;

    struct KindAdapter(AdapterKind);

    #[async_trait::async_trait]
    impl ProviderAdapter for KindAdapter {
        fn kind(&self) -> AdapterKind {
            self.0
        }

        async fn check(&self, domain: &DomainName) -> Result<ProviderResult> {
            Ok(ProviderResult::success(domain.as_str()))
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = ProviderRegistry::new()
            .with(ProviderId::Gandi, Arc::new(KindAdapter(AdapterKind::Api)))
            .with(
                ProviderId::Porkbun,
                Arc::new(KindAdapter(AdapterKind::Browser)),
            );

        assert_eq!(registry.len(), 2);
        assert!(registry.get(ProviderId::Gandi).is_ok());
        assert_eq!(
            registry.kind_of(ProviderId::Porkbun),
            Some(AdapterKind::Browser)
        );
        // declaration order, not insertion order
        assert_eq!(registry.ids(), vec![ProviderId::Porkbun, ProviderId::Gandi]);
    }

    #[test]
    fn test_missing_provider() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(ProviderId::Hover),
            Err(ProviderError::NotRegistered(ProviderId::Hover))
        ));
        assert_eq!(registry.kind_of(ProviderId::Hover), None);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProviderRegistry::new();
        registry.register(ProviderId::Hover, Arc::new(KindAdapter(AdapterKind::Api)));
        registry.register(
            ProviderId::Hover,
            Arc::new(KindAdapter(AdapterKind::Browser)),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.kind_of(ProviderId::Hover),
            Some(AdapterKind::Browser)
        );
    }
}
