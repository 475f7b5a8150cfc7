//! Shared types used across regscout.
//!
//! `DomainName` and `ProviderId` can only be constructed through validation,
//! so anything holding one has already passed the query boundary.

use crate::error::ValidationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Maximum length of a fully qualified domain name, without the root dot.
const MAX_DOMAIN_LEN: usize = 253;

/// A normalized, syntactically valid fully qualified domain name.
///
/// Normalization trims surrounding whitespace, strips a single trailing
/// root dot and lowercases the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    /// Normalize and validate a domain name.
    ///
    /// # Errors
    /// Returns `ValidationError::InvalidDomain` if the normalized name is not
    /// a valid FQDN.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = Self::normalize(raw);
        Self::validate(raw, &normalized)?;
        Ok(Self(normalized))
    }

    /// Apply the normalization rules without validating.
    #[must_use]
    pub fn normalize(raw: &str) -> String {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
        trimmed.to_ascii_lowercase()
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last label, e.g. `tech` for `example.tech`.
    #[must_use]
    pub fn tld(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Everything before the last label, e.g. `example` for `example.tech`.
    #[must_use]
    pub fn sld(&self) -> &str {
        self.0
            .rsplit_once('.')
            .map_or(self.0.as_str(), |(head, _)| head)
    }

    /// Case-insensitive comparison against an arbitrary string.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        Self::normalize(other) == self.0
    }

    fn validate(raw: &str, name: &str) -> Result<(), ValidationError> {
        static LABEL_REGEX: OnceLock<Regex> = OnceLock::new();
        static TLD_REGEX: OnceLock<Regex> = OnceLock::new();
        let label_regex = LABEL_REGEX.get_or_init(|| {
            Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex")
        });
        let tld_regex = TLD_REGEX.get_or_init(|| {
            Regex::new(r"^(?:[a-z]{2,63}|xn--[a-z0-9-]{1,59})$").expect("valid regex")
        });

        let invalid = |reason: String| ValidationError::InvalidDomain {
            domain: raw.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid("domain is empty".to_string()));
        }

        if name.len() > MAX_DOMAIN_LEN {
            return Err(invalid(format!(
                "must be at most {MAX_DOMAIN_LEN} characters, got {}",
                name.len()
            )));
        }

        let labels: Vec<&str> = name.split('.').collect();
        if labels.len() < 2 {
            return Err(invalid("must contain at least two labels".to_string()));
        }

        for label in &labels {
            if !label_regex.is_match(label) {
                return Err(invalid(format!("invalid label '{label}'")));
            }
        }

        let tld = labels[labels.len() - 1];
        if !tld_regex.is_match(tld) {
            return Err(invalid(format!("invalid top-level label '{tld}'")));
        }

        Ok(())
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DomainName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DomainName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DomainName> for String {
    fn from(value: DomainName) -> Self {
        value.0
    }
}

/// Identifiers of every provider regscout knows how to query.
///
/// The set is fixed at compile time; the registry maps each identifier to
/// an adapter at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Porkbun
    Porkbun,
    /// Namecheap
    Namecheap,
    /// `GoDaddy`
    GoDaddy,
    /// Cloudflare Registrar
    Cloudflare,
    /// Dynadot
    Dynadot,
    /// Gandi
    Gandi,
    /// Hover
    Hover,
    /// `NameSilo`
    NameSilo,
    /// Spaceship
    Spaceship,
    /// Squarespace Domains
    Squarespace,
    /// IONOS
    Ionos,
    /// Hostinger
    Hostinger,
}

impl ProviderId {
    /// Every known provider, in a stable order.
    pub const ALL: [Self; 12] = [
        Self::Porkbun,
        Self::Namecheap,
        Self::GoDaddy,
        Self::Cloudflare,
        Self::Dynadot,
        Self::Gandi,
        Self::Hover,
        Self::NameSilo,
        Self::Spaceship,
        Self::Squarespace,
        Self::Ionos,
        Self::Hostinger,
    ];

    /// Wire name of the provider, as used in cache keys and JSON.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Porkbun => "porkbun",
            Self::Namecheap => "namecheap",
            Self::GoDaddy => "godaddy",
            Self::Cloudflare => "cloudflare",
            Self::Dynadot => "dynadot",
            Self::Gandi => "gandi",
            Self::Hover => "hover",
            Self::NameSilo => "namesilo",
            Self::Spaceship => "spaceship",
            Self::Squarespace => "squarespace",
            Self::Ionos => "ionos",
            Self::Hostinger => "hostinger",
        }
    }

    /// Human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Porkbun => "Porkbun",
            Self::Namecheap => "Namecheap",
            Self::GoDaddy => "GoDaddy",
            Self::Cloudflare => "Cloudflare Registrar",
            Self::Dynadot => "Dynadot",
            Self::Gandi => "Gandi",
            Self::Hover => "Hover",
            Self::NameSilo => "NameSilo",
            Self::Spaceship => "Spaceship",
            Self::Squarespace => "Squarespace Domains",
            Self::Ionos => "IONOS",
            Self::Hostinger => "Hostinger",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownProvider(s.to_string()))
    }
}
