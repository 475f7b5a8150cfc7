//! Query submission and validation.
//!
//! A [`CheckRequest`] is what callers send; a [`DomainQuery`] is what the
//! aggregator runs. Turning one into the other is the only place an
//! `InvalidQuery` can come from.

use crate::error::{CheckError, Result};
use regscout_core::{CheckingConfig, DomainName, ProviderId};
use regscout_provider::ProviderRegistry;
use serde::{Deserialize, Serialize};

/// A check as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    /// Domain to check, not yet validated
    pub domain: String,
    /// Provider ids; every registered provider when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
    /// Per-provider timeout; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl CheckRequest {
    /// Request for `domain` with every default.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            providers: None,
            timeout_ms: None,
        }
    }

    /// Restrict to the given providers.
    #[must_use]
    pub fn with_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    /// Set the per-provider timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Timeout policy applied while resolving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Used when the request has no timeout
    pub default_timeout_ms: u64,
    /// Larger requested timeouts are clamped to this
    pub max_timeout_ms: u64,
}

impl QueryLimits {
    /// Limits from the checking section of the configuration.
    #[must_use]
    pub fn from_config(config: &CheckingConfig) -> Self {
        Self {
            default_timeout_ms: config.default_timeout_ms,
            max_timeout_ms: config.max_timeout_ms,
        }
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self::from_config(&CheckingConfig::default())
    }
}

/// A validated query.
///
/// `domain` is normalized, `providers` is non-empty, duplicate-free and
/// only names registered providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainQuery {
    /// Normalized domain
    pub domain: DomainName,
    /// Providers to ask, in request order
    pub providers: Vec<ProviderId>,
    /// Per-provider logical timeout
    pub timeout_ms: u64,
}

impl DomainQuery {
    /// Validate `request` against the registry and limits.
    ///
    /// # Errors
    /// Returns `CheckError::InvalidQuery` for a malformed domain, an empty
    /// provider list, an unknown or unregistered provider, or a zero
    /// timeout.
    pub fn resolve(
        request: &CheckRequest,
        registry: &ProviderRegistry,
        limits: QueryLimits,
    ) -> Result<Self> {
        let domain = DomainName::parse(&request.domain)?;

        let providers = match &request.providers {
            None => registry.ids(),
            Some(names) => {
                let mut providers: Vec<ProviderId> = Vec::with_capacity(names.len());
                for name in names {
                    let id: ProviderId = name.parse()?;
                    if !registry.contains(id) {
                        return Err(CheckError::InvalidQuery(format!(
                            "provider '{id}' is not enabled"
                        )));
                    }
                    if !providers.contains(&id) {
                        providers.push(id);
                    }
                }
                providers
            }
        };

        if providers.is_empty() {
            return Err(CheckError::InvalidQuery(
                "at least one provider is required".to_string(),
            ));
        }

        let timeout_ms = match request.timeout_ms {
            None => limits.default_timeout_ms,
            Some(0) => {
                return Err(CheckError::InvalidQuery(
                    "timeoutMs must be greater than zero".to_string(),
                ))
            }
            Some(requested) => requested.min(limits.max_timeout_ms),
        };

        Ok(Self {
            domain,
            providers,
            timeout_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regscout_provider::{AdapterKind, ProviderAdapter, ProviderResult};
    use std::sync::Arc;

    struct NoopAdapter;

    #[async_trait::async_trait]
    impl ProviderAdapter for NoopAdapter {
        fn kind(&self) -> AdapterKind {
            AdapterKind::Api
        }

        async fn check(&self, domain: &DomainName) -> regscout_provider::Result<ProviderResult> {
            Ok(ProviderResult::success(domain.as_str()))
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new()
            .with(ProviderId::Porkbun, Arc::new(NoopAdapter))
            .with(ProviderId::Gandi, Arc::new(NoopAdapter))
    }

    fn limits() -> QueryLimits {
        QueryLimits {
            default_timeout_ms: 30_000,
            max_timeout_ms: 120_000,
        }
    }

    fn resolve(request: &CheckRequest) -> Result<DomainQuery> {
        DomainQuery::resolve(request, &registry(), limits())
    }

    #[test]
    fn test_defaults() {
        let query = resolve(&CheckRequest::new(" Example.TECH. ")).expect("resolve");
        assert_eq!(query.domain.as_str(), "example.tech");
        assert_eq!(query.providers, vec![ProviderId::Porkbun, ProviderId::Gandi]);
        assert_eq!(query.timeout_ms, 30_000);
    }

    #[test]
    fn test_explicit_providers_deduplicated_in_order() {
        let request =
            CheckRequest::new("example.tech").with_providers(["gandi", "PORKBUN", "gandi"]);
        let query = resolve(&request).expect("resolve");
        assert_eq!(query.providers, vec![ProviderId::Gandi, ProviderId::Porkbun]);
    }

    #[test]
    fn test_rejections() {
        let cases = [
            CheckRequest::new("not a domain"),
            CheckRequest::new("localhost"),
            CheckRequest::new("example.tech").with_providers(Vec::<String>::new()),
            CheckRequest::new("example.tech").with_providers(["nosuchregistrar"]),
            CheckRequest::new("example.tech").with_providers(["hover"]),
            CheckRequest::new("example.tech").with_timeout_ms(0),
        ];

        for request in cases {
            assert!(
                matches!(resolve(&request), Err(CheckError::InvalidQuery(_))),
                "expected rejection for {request:?}"
            );
        }
    }

    #[test]
    fn test_timeout_clamped() {
        let query = resolve(&CheckRequest::new("example.tech").with_timeout_ms(600_000))
            .expect("resolve");
        assert_eq!(query.timeout_ms, 120_000);

        let query =
            resolve(&CheckRequest::new("example.tech").with_timeout_ms(5_000)).expect("resolve");
        assert_eq!(query.timeout_ms, 5_000);
    }

    #[test]
    fn test_request_json() {
        let request: CheckRequest = serde_json::from_str(
            r#"{"domain":"example.tech","providers":["porkbun"],"timeoutMs":5000}"#,
        )
        .expect("deserialize");
        assert_eq!(
            request,
            CheckRequest::new("example.tech")
                .with_providers(["porkbun"])
                .with_timeout_ms(5000)
        );
    }

    #[test]
    fn test_empty_registry_rejects_default_query() {
        let result = DomainQuery::resolve(
            &CheckRequest::new("example.tech"),
            &ProviderRegistry::new(),
            limits(),
        );
        assert!(matches!(result, Err(CheckError::InvalidQuery(_))));
    }
}
