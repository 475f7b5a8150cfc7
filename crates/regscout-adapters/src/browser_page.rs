//! Adapter for registrars whose search page has to be rendered.
//!
//! The page is loaded in a limiter-bounded [`BrowserSession`], its HTML is
//! parsed with `scraper` and the text under the configured selector is
//! matched against the provider's patterns.

use crate::error::{AdapterError, Result};
use crate::template::{expand_url, validate_template};
use async_trait::async_trait;
use regex::Regex;
use regscout_browser::{
    BrowserActions, BrowserError, BrowserSession, SessionManager, SessionOptions,
};
use regscout_core::{BrowserPageSource, DomainName, ProviderId};
use regscout_provider::{AdapterKind, ProviderAdapter, ProviderError, ProviderResult};
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::str::FromStr;
use tracing::{debug, warn};

/// Raw text kept on a result for debugging.
const RAW_TEXT_LIMIT: usize = 2_000;

/// Compiled matchers for a rendered search page.
#[derive(Debug, Clone)]
pub struct PagePatterns {
    pub available: Vec<Regex>,
    pub unavailable: Vec<Regex>,
    pub premium: Vec<Regex>,
    pub registration_price: Option<Regex>,
    pub renewal_price: Option<Regex>,
    pub currency: Option<String>,
}

impl PagePatterns {
    pub fn compile(provider: ProviderId, source: &BrowserPageSource) -> Result<Self> {
        let one = |pattern: &String| {
            Regex::new(pattern).map_err(|source| AdapterError::InvalidPattern {
                provider,
                pattern: pattern.clone(),
                source,
            })
        };
        let many = |patterns: &[String]| patterns.iter().map(one).collect::<Result<Vec<_>>>();

        Ok(Self {
            available: many(&source.available_patterns)?,
            unavailable: many(&source.unavailable_patterns)?,
            premium: many(&source.premium_patterns)?,
            registration_price: source.registration_price_pattern.as_ref().map(one).transpose()?,
            renewal_price: source.renewal_price_pattern.as_ref().map(one).transpose()?,
            currency: source.currency.clone(),
        })
    }
}

/// Interpret the visible text of a search page.
///
/// Unavailable patterns win over available ones since "not available"
/// usually contains "available". Text matching neither leaves
/// `available` unset. Prices come from capture group 1.
pub fn interpret_page_text(
    text: &str,
    patterns: &PagePatterns,
    domain: &DomainName,
) -> ProviderResult {
    let matches_any = |regexes: &[Regex]| regexes.iter().any(|re| re.is_match(text));

    let mut result = ProviderResult::success(domain.as_str());
    if matches_any(&patterns.unavailable) {
        result = result.with_available(false);
    } else if matches_any(&patterns.available) {
        result = result.with_available(true);
    }

    if !patterns.premium.is_empty() {
        result = result.with_premium(matches_any(&patterns.premium));
    }

    if let Some(price) = patterns
        .registration_price
        .as_ref()
        .and_then(|re| capture_price(re, text))
    {
        result = result.with_registration_price(price);
    }
    if let Some(price) = patterns
        .renewal_price
        .as_ref()
        .and_then(|re| capture_price(re, text))
    {
        result = result.with_renewal_price(price);
    }

    let priced = result.registration_price.is_some() || result.renewal_price.is_some();
    if let (true, Some(currency)) = (priced, &patterns.currency) {
        result = result.with_currency(currency.to_ascii_uppercase());
    }

    result.with_raw_text(truncate(text, RAW_TEXT_LIMIT))
}

fn capture_price(re: &Regex, text: &str) -> Option<Decimal> {
    let raw = re.captures(text)?.get(1)?.as_str();
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    Decimal::from_str(&cleaned).ok()
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Text under `selector`, whitespace collapsed. `None` when nothing matches.
pub fn select_text(html: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    let mut found = false;
    let mut words = Vec::new();
    for element in document.select(selector) {
        found = true;
        words.extend(element.text().flat_map(str::split_whitespace).map(str::to_string));
    }
    found.then(|| words.join(" "))
}

/// Renders a search URL in a browser session and reads the page.
#[derive(Debug)]
pub struct BrowserPageAdapter {
    provider: ProviderId,
    sessions: SessionManager,
    options: SessionOptions,
    source: BrowserPageSource,
    text_selector: Selector,
    patterns: PagePatterns,
}

impl BrowserPageAdapter {
    pub fn new(
        provider: ProviderId,
        sessions: SessionManager,
        options: SessionOptions,
        source: BrowserPageSource,
    ) -> Result<Self> {
        validate_template(&source.url_template)
            .map_err(|reason| AdapterError::InvalidTemplate { provider, reason })?;
        let text_selector =
            Selector::parse(&source.text_selector).map_err(|_| AdapterError::InvalidSelector {
                provider,
                selector: source.text_selector.clone(),
            })?;
        if let Some(ready) = &source.ready_selector {
            Selector::parse(ready).map_err(|_| AdapterError::InvalidSelector {
                provider,
                selector: ready.clone(),
            })?;
        }
        let patterns = PagePatterns::compile(provider, &source)?;

        Ok(Self {
            provider,
            sessions,
            options,
            source,
            text_selector,
            patterns,
        })
    }

    async fn read_page(
        &self,
        session: &BrowserSession,
        domain: &DomainName,
    ) -> regscout_provider::Result<String> {
        let url = expand_url(&self.source.url_template, domain)
            .map_err(|e| ProviderError::Network(format!("invalid URL: {e}")))?;
        debug!(provider = %self.provider, url = %url, "loading search page");

        session.navigate(url.as_str()).await.map_err(session_error)?;
        if let Some(ready) = &self.source.ready_selector {
            let timeout_ms =
                u64::try_from(self.sessions.settings().navigation_timeout.as_millis())
                    .unwrap_or(u64::MAX);
            session
                .wait_for_selector(ready, timeout_ms)
                .await
                .map_err(session_error)?;
        }
        session.page_content().await.map_err(session_error)
    }
}

fn session_error(error: BrowserError) -> ProviderError {
    match error {
        BrowserError::NavigationError(e) => ProviderError::Network(e),
        BrowserError::SelectorNotFound(selector) => {
            ProviderError::Parse(format!("page never showed '{selector}'"))
        }
        other => ProviderError::Session(other.to_string()),
    }
}

#[async_trait]
impl ProviderAdapter for BrowserPageAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Browser
    }

    async fn check(&self, domain: &DomainName) -> regscout_provider::Result<ProviderResult> {
        let session = self
            .sessions
            .open(self.options.clone())
            .await
            .map_err(|e| ProviderError::Session(e.to_string()))?;

        let page = self.read_page(&session, domain).await;
        session.close().await;
        let html = page?;

        let text = select_text(&html, &self.text_selector).ok_or_else(|| {
            ProviderError::Parse(format!("nothing matched '{}'", self.source.text_selector))
        })?;
        let result = interpret_page_text(&text, &self.patterns, domain);
        if result.available.is_none() {
            warn!(provider = %self.provider, domain = %domain, "page text matched no availability pattern");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> DomainName {
        DomainName::parse("example.tech").expect("valid domain")
    }

    fn source() -> BrowserPageSource {
        BrowserPageSource {
            url_template: "https://www.registrar.test/search?q={domain}".to_string(),
            ready_selector: None,
            text_selector: "body".to_string(),
            available_patterns: vec![r"(?i)\bis available\b".to_string()],
            unavailable_patterns: vec![r"(?i)\bis (not available|taken)\b".to_string()],
            premium_patterns: vec![r"(?i)\bpremium\b".to_string()],
            registration_price_pattern: Some(r"(?i)register for \$([\d,.]+)".to_string()),
            renewal_price_pattern: Some(r"(?i)renews at \$([\d,.]+)".to_string()),
            currency: Some("usd".to_string()),
        }
    }

    fn patterns() -> PagePatterns {
        PagePatterns::compile(ProviderId::Hover, &source()).expect("compile patterns")
    }

    #[test]
    fn test_available_with_prices() {
        let text = "example.tech is available. Register for $4.99, renews at $1,049.00 per year";
        let result = interpret_page_text(text, &patterns(), &domain());

        assert!(result.ok);
        assert_eq!(result.available, Some(true));
        assert_eq!(result.is_premium, Some(false));
        assert_eq!(result.registration_price, Some(Decimal::new(499, 2)));
        assert_eq!(result.renewal_price, Some(Decimal::new(104_900, 2)));
        assert_eq!(result.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_unavailable_checked_first() {
        let text = "Sorry, example.tech is not available. Similar names that are available:";
        let result = interpret_page_text(text, &patterns(), &domain());

        assert_eq!(result.available, Some(false));
        assert_eq!(result.registration_price, None);
        assert_eq!(result.currency, None);
    }

    #[test]
    fn test_unrecognized_page_leaves_availability_unset() {
        let result = interpret_page_text("Please wait while we search", &patterns(), &domain());
        assert!(result.ok);
        assert_eq!(result.available, None);
        assert_eq!(result.raw_text.as_deref(), Some("Please wait while we search"));
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let mut bad_pattern = source();
        bad_pattern.available_patterns.push("(unclosed".to_string());
        assert!(matches!(
            PagePatterns::compile(ProviderId::Hover, &bad_pattern),
            Err(AdapterError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_select_text_collapses_whitespace() {
        let html = "<html><body><div class='result'>example.tech\n   is <b>available</b></div>\
                    <div class='ads'>buy hosting</div></body></html>";
        let selector = Selector::parse(".result").expect("valid selector");
        assert_eq!(
            select_text(html, &selector).as_deref(),
            Some("example.tech is available")
        );

        let missing = Selector::parse(".nothing").expect("valid selector");
        assert_eq!(select_text(html, &missing), None);
    }
}
