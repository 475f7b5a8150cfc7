//! The `ProviderResult` contract every adapter and cache entry satisfies.

use regscout_core::DomainName;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of one provider lookup for one domain.
///
/// When `ok` is false, `error` is set and no availability or pricing field
/// is present. When `ok` is true, `available` may still be absent, meaning
/// the provider answered but could not tell (for example an unsupported
/// TLD). Prices are in `currency` exactly as the provider stated them.
///
/// Prices travel as JSON numbers, so they pass through `f64` on the wire.
/// That is exact for ordinary registrar prices; values beyond about 15
/// significant digits lose precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    /// Whether the provider produced an answer
    pub ok: bool,
    /// Domain the answer is about
    pub domain: String,
    /// Whether the domain can be registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    /// Whether the provider prices this domain as premium
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    /// First-year registration price, serialized as an `f64` number
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub registration_price: Option<Decimal>,
    /// Renewal price, serialized as an `f64` number
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub renewal_price: Option<Decimal>,
    /// ISO 4217 currency of the prices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Failure description, set iff `ok` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Raw text the answer was derived from, for debugging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl ProviderResult {
    /// A successful answer with no fields filled in yet.
    #[must_use]
    pub fn success(domain: impl Into<String>) -> Self {
        Self {
            ok: true,
            domain: domain.into(),
            available: None,
            is_premium: None,
            registration_price: None,
            renewal_price: None,
            currency: None,
            error: None,
            raw_text: None,
        }
    }

    /// A failed lookup.
    #[must_use]
    pub fn failure(domain: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::success(domain)
        }
    }

    /// The result synthesized when the logical timeout wins the race.
    #[must_use]
    pub fn timed_out(domain: impl Into<String>, timeout_ms: u64) -> Self {
        Self::failure(domain, format!("Timed out after {timeout_ms} ms"))
    }

    /// Set availability.
    #[must_use]
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = Some(available);
        self
    }

    /// Set the premium flag.
    #[must_use]
    pub fn with_premium(mut self, is_premium: bool) -> Self {
        self.is_premium = Some(is_premium);
        self
    }

    /// Set the registration price.
    #[must_use]
    pub fn with_registration_price(mut self, price: Decimal) -> Self {
        self.registration_price = Some(price);
        self
    }

    /// Set the renewal price.
    #[must_use]
    pub fn with_renewal_price(mut self, price: Decimal) -> Self {
        self.renewal_price = Some(price);
        self
    }

    /// Set the currency.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Attach the raw text the answer came from.
    #[must_use]
    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = Some(raw_text.into());
        self
    }

    /// Enforce the result invariants against the queried domain.
    ///
    /// A failure loses any answer fields and always carries an error; a
    /// success reported for another domain becomes a failure. The domain is
    /// rewritten to the normalized query domain either way.
    #[must_use]
    pub fn conform(mut self, queried: &DomainName) -> Self {
        if self.ok && !queried.matches(&self.domain) {
            tracing::warn!(
                queried = %queried,
                reported = %self.domain,
                "provider answered for a different domain"
            );
            let message = format!("provider answered for a different domain: {}", self.domain);
            return Self::failure(queried.as_str(), message).with_raw_opt(self.raw_text);
        }

        self.domain = queried.as_str().to_string();

        if self.ok {
            self.error = None;
        } else {
            self.available = None;
            self.is_premium = None;
            self.registration_price = None;
            self.renewal_price = None;
            self.currency = None;
            if self.error.as_deref().map_or(true, str::is_empty) {
                self.error = Some("provider reported failure".to_string());
            }
        }

        self
    }

    fn with_raw_opt(mut self, raw_text: Option<String>) -> Self {
        self.raw_text = raw_text;
        self
    }
}
