//! Cloudflare DNS backend
//!
//! Implements the `DnsProvider` contract over the Cloudflare v4 REST API.
//! Zone lookup queries by exact name; an empty result is a miss, not a
//! failure. Alias records are rendered as unproxied CNAMEs since
//! Cloudflare has no native alias record set.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{RecordData, RecordSpec, ZoneId};
use super::DnsProvider;

const CLOUDFLARE_API: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare-backed DNS provider
pub struct CloudflareDns {
    client: Client,
    api_token: String,
}

// ============================================================
// API Response Types
// ============================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    errors: Vec<ApiError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[allow(dead_code)]
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    #[allow(dead_code)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest {
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    ttl: u32,
    proxied: bool,
}

// ============================================================
// Client Implementation
// ============================================================

impl CloudflareDns {
    /// Create a new Cloudflare DNS provider with an API token
    pub fn new(api_token: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent("filehost-agent/0.1.0")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, api_token })
    }

    fn auth_headers(&self) -> Result<reqwest::header::HeaderMap> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Authorization",
            format!("Bearer {}", self.api_token)
                .parse()
                .context("Invalid API token")?,
        );
        headers.insert(
            "Content-Type",
            "application/json"
                .parse()
                .context("Invalid content type header")?,
        );
        Ok(headers)
    }

    async fn post_record(
        &self,
        zone: &ZoneId,
        record_type: &str,
        name: &str,
        content: &str,
        ttl: u32,
    ) -> Result<()> {
        let url = format!("{}/zones/{}/dns_records", CLOUDFLARE_API, zone);

        let request = CreateRecordRequest {
            record_type: record_type.to_uppercase(),
            name: name.trim_end_matches('.').to_string(),
            content: content.trim_end_matches('.').to_string(),
            ttl,
            proxied: false,
        };

        let response: ApiResponse<CreatedRecord> = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(&request)
            .send()
            .await
            .context("Failed to create DNS record")?
            .json()
            .await
            .context("Failed to parse create response")?;

        if !response.success {
            let errors: Vec<String> = response.errors.iter().map(|e| e.message.clone()).collect();
            bail!("Cloudflare API error: {}", errors.join(", "));
        }

        let record = response.result.context("No record in response")?;
        debug!(record_id = %record.id, name = %name, "DNS record created");
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for CloudflareDns {
    async fn lookup_zone(&self, name: &str) -> Result<Option<ZoneId>> {
        // Cloudflare zone names carry no trailing dot
        let zone_name = name.trim_end_matches('.');
        debug!("Looking up zone ID for: {}", zone_name);

        let url = format!(
            "{}/zones?name={}",
            CLOUDFLARE_API,
            urlencoding::encode(zone_name)
        );

        let response: ApiResponse<Vec<Zone>> = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .context("Failed to query zones")?
            .json()
            .await
            .context("Failed to parse zones response")?;

        if !response.success {
            let errors: Vec<String> = response.errors.iter().map(|e| e.message.clone()).collect();
            bail!("Cloudflare API error: {}", errors.join(", "));
        }

        let zones = response.result.unwrap_or_default();
        match zones.first() {
            Some(zone) => {
                debug!("Found zone ID: {}", zone.id);
                Ok(Some(ZoneId::new(zone.id.clone())))
            }
            None => Ok(None),
        }
    }

    async fn create_record(&self, zone: &ZoneId, record: &RecordSpec) -> Result<()> {
        match &record.data {
            RecordData::Values { ttl, values } => {
                for value in values {
                    self.post_record(
                        zone,
                        &record.record_type.to_string(),
                        &record.name,
                        value,
                        *ttl,
                    )
                    .await?;
                }
                Ok(())
            }
            RecordData::Alias { target_domain, .. } => {
                // No alias record sets on Cloudflare; an unproxied CNAME
                // with automatic TTL plays the same role
                self.post_record(zone, "CNAME", &record.name, target_domain, 1)
                    .await
            }
        }
    }
}
