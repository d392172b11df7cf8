//! Hosted zone resolution
//!
//! Finds the most specific hosted zone owning a domain by querying the
//! DNS provider for each ancestor candidate, longest first. A domain may
//! have both `sub.domain.com` and `domain.com` registered as independent
//! zones; records must land in the narrowest owning zone, so the first
//! existing candidate wins.

use tracing::{debug, warn};

use crate::domain::DomainName;
use crate::error::ProvisionError;
use crate::providers::types::ZoneId;
use crate::providers::DnsProvider;

/// Resolves a domain to its owning hosted zone
pub struct ZoneResolver<'a> {
    dns: &'a dyn DnsProvider,
}

impl<'a> ZoneResolver<'a> {
    pub fn new(dns: &'a dyn DnsProvider) -> Self {
        Self { dns }
    }

    /// Resolve the most specific zone that owns `domain`.
    ///
    /// Candidates are tried most specific first. A lookup miss or a
    /// lookup error on one candidate only advances the search; the call
    /// fails with `NoZoneFound` after all candidates are exhausted.
    pub async fn resolve(&self, domain: &DomainName) -> Result<ZoneId, ProvisionError> {
        for candidate in domain.zone_candidates() {
            match self.dns.lookup_zone(&candidate).await {
                Ok(Some(zone_id)) => {
                    debug!(candidate = %candidate, zone_id = %zone_id, "Resolved hosted zone");
                    return Ok(zone_id);
                }
                Ok(None) => {
                    debug!(candidate = %candidate, "No hosted zone for candidate");
                }
                Err(e) => {
                    warn!(candidate = %candidate, error = %e, "Zone lookup failed, trying next candidate");
                }
            }
        }
        Err(ProvisionError::NoZoneFound(domain.to_string()))
    }
}
