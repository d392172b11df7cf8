//! Domain names and zone candidate enumeration
//!
//! A `DomainName` is an immutable dot-separated label sequence. Zone
//! candidates are the ancestor domains tried against the DNS provider,
//! most specific first, each in trailing-dot normalized form.

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// A fully-qualified domain name, e.g. `files.example.com`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainName(String);

impl DomainName {
    /// Parse a domain name, rejecting empty labels and stray dots
    pub fn parse(raw: &str) -> Result<Self, ProvisionError> {
        let trimmed = raw.trim().trim_end_matches('.');
        if trimmed.is_empty() {
            return Err(ProvisionError::InvalidDomain(
                "domain name is empty".to_string(),
            ));
        }
        if trimmed.split('.').any(|label| label.is_empty()) {
            return Err(ProvisionError::InvalidDomain(format!(
                "domain name '{raw}' contains an empty label"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The domain as supplied, without a trailing dot
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The label sequence, most specific label first
    pub fn labels(&self) -> Vec<&str> {
        self.0.split('.').collect()
    }

    /// Ancestor zone candidates, most specific first, each with the
    /// trailing dot the DNS provider expects.
    ///
    /// For `a.b.example.com` this yields `a.b.example.com.`,
    /// `b.example.com.`, `example.com.`, `com.`.
    pub fn zone_candidates(&self) -> impl Iterator<Item = String> + '_ {
        let labels = self.labels();
        (0..labels.len()).map(move |i| format!("{}.", labels[i..].join(".")))
    }
}

impl std::fmt::Display for DomainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
