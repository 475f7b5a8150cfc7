//! Adapter for registrars that expose a JSON availability endpoint.

use crate::error::{AdapterError, Result};
use crate::template::{expand_url, validate_template};
use async_trait::async_trait;
use regscout_core::{DomainName, HttpJsonSource, ProviderId};
use regscout_provider::{AdapterKind, ProviderAdapter, ProviderError, ProviderResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Build the shared HTTP client.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("regscout/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GETs a URL template and reads the answer through JSON pointers.
#[derive(Debug, Clone)]
pub struct HttpJsonAdapter {
    provider: ProviderId,
    client: Client,
    source: HttpJsonSource,
    headers: HeaderMap,
}

impl HttpJsonAdapter {
    pub fn new(provider: ProviderId, client: Client, source: HttpJsonSource) -> Result<Self> {
        let invalid = |reason: String| AdapterError::InvalidTemplate { provider, reason };

        validate_template(&source.url_template).map_err(invalid)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &source.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| invalid(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        Ok(Self {
            provider,
            client,
            source,
            headers,
        })
    }
}

#[async_trait]
impl ProviderAdapter for HttpJsonAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Api
    }

    async fn check(&self, domain: &DomainName) -> regscout_provider::Result<ProviderResult> {
        let url = expand_url(&self.source.url_template, domain)
            .map_err(|e| ProviderError::Network(format!("invalid URL: {e}")))?;
        debug!(provider = %self.provider, url = %url, "requesting availability");

        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Blocked(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("response is not JSON: {e}")))?;

        extract_result(&body, &self.source, domain)
    }
}

/// Read a provider answer out of a JSON body.
///
/// Missing pointers leave the corresponding field unset; an availability
/// pointer that resolves to nothing is a parse error.
pub fn extract_result(
    body: &Value,
    source: &HttpJsonSource,
    domain: &DomainName,
) -> regscout_provider::Result<ProviderResult> {
    let mut result = ProviderResult::success(domain.as_str());

    if let Some(pointer) = &source.available_pointer {
        let value = body.pointer(pointer).ok_or_else(|| {
            ProviderError::Parse(format!("no value at {pointer}"))
        })?;
        let available = availability(value, &source.available_values)
            .ok_or_else(|| ProviderError::Parse(format!("unexpected value at {pointer}: {value}")))?;
        result = result.with_available(available);
    }

    if let Some(premium) = source
        .premium_pointer
        .as_deref()
        .and_then(|p| body.pointer(p))
        .and_then(truthy)
    {
        result = result.with_premium(premium);
    }

    if let Some(price) = price_at(body, source.registration_price_pointer.as_deref())? {
        result = result.with_registration_price(price);
    }
    if let Some(price) = price_at(body, source.renewal_price_pointer.as_deref())? {
        result = result.with_renewal_price(price);
    }

    let currency = source
        .currency_pointer
        .as_deref()
        .and_then(|p| body.pointer(p))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| source.currency.clone());
    if let Some(currency) = currency {
        result = result.with_currency(currency.to_ascii_uppercase());
    }

    Ok(result)
}

fn availability(value: &Value, available_values: &[String]) -> Option<bool> {
    match value {
        Value::String(s) if !available_values.is_empty() => Some(
            available_values
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(s)),
        ),
        other => truthy(other),
    }
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "available" | "1" => Some(true),
            "false" | "no" | "unavailable" | "taken" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn price_at(body: &Value, pointer: Option<&str>) -> regscout_provider::Result<Option<Decimal>> {
    let Some(value) = pointer.and_then(|p| body.pointer(p)) else {
        return Ok(None);
    };
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', ""),
        Value::Null => return Ok(None),
        other => {
            return Err(ProviderError::Parse(format!("price is not a number: {other}")));
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|e| ProviderError::Parse(format!("invalid price '{text}': {e}")))
}
