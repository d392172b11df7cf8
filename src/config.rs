//! Stack configuration
//!
//! Tunables for a single file hosting stack deployment. Defaults mirror
//! the production topology: long-lived caching keyed only on the `etag`
//! query string, multipart-upload parameters forwarded to the origin.

use serde::{Deserialize, Serialize};

use crate::domain::DomainName;

/// What the bucket policy grants the CDN service principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[clap(rename_all = "snake_case")]
pub enum AccessMode {
    /// `s3:GetObject` only
    #[default]
    ReadOnly,
    /// `s3:GetObject` and `s3:PutObject` (write-back through the CDN)
    ReadWrite,
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMode::ReadOnly => write!(f, "read_only"),
            AccessMode::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// Cache policy tunables for the CDN distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePolicyConfig {
    /// Default TTL in seconds
    pub default_ttl: u64,
    /// Maximum TTL in seconds
    pub max_ttl: u64,
    /// Minimum TTL in seconds
    pub min_ttl: u64,
    /// Query string parameters that participate in the cache key
    pub query_string_whitelist: Vec<String>,
    /// Normalize `Accept-Encoding: gzip` into the cache key
    pub accept_encoding_gzip: bool,
    /// Normalize `Accept-Encoding: br` into the cache key
    pub accept_encoding_brotli: bool,
}

impl Default for CachePolicyConfig {
    fn default() -> Self {
        Self {
            default_ttl: 86_400,
            max_ttl: 31_536_000,
            min_ttl: 1,
            query_string_whitelist: vec!["etag".to_string()],
            accept_encoding_gzip: false,
            accept_encoding_brotli: false,
        }
    }
}

/// Origin request policy tunables for the CDN distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginRequestPolicyConfig {
    /// Headers forwarded to the origin
    pub header_whitelist: Vec<String>,
    /// Query string parameters forwarded to the origin
    pub query_string_whitelist: Vec<String>,
}

impl Default for OriginRequestPolicyConfig {
    fn default() -> Self {
        Self {
            header_whitelist: vec!["Content-Type".to_string()],
            query_string_whitelist: vec!["partNumber".to_string(), "uploadId".to_string()],
        }
    }
}

/// Configuration for one file hosting stack deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// The custom domain the stack serves
    pub domain: DomainName,
    /// Existing bucket to use as the origin; a new bucket is created when absent
    pub existing_bucket: Option<String>,
    /// Read-only or read+write bucket policy
    pub access_mode: AccessMode,
    /// Secret-store parameter name for the signed-URL private key
    pub key_parameter_name: String,
    /// Cache policy tunables
    pub cache_policy: CachePolicyConfig,
    /// Origin request policy tunables
    pub origin_request_policy: OriginRequestPolicyConfig,
}

impl StackConfig {
    /// Configuration with defaults for the given domain
    pub fn new(domain: DomainName) -> Self {
        let key_parameter_name = format!("/filehost/{}/signing-key", domain);
        Self {
            domain,
            existing_bucket: None,
            access_mode: AccessMode::default(),
            key_parameter_name,
            cache_policy: CachePolicyConfig::default(),
            origin_request_policy: OriginRequestPolicyConfig::default(),
        }
    }

    /// Use an existing bucket as the origin instead of creating one
    pub fn with_existing_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.existing_bucket = Some(bucket.into());
        self
    }

    /// Select the bucket policy variant
    pub fn with_access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_topology() {
        let cache = CachePolicyConfig::default();
        assert_eq!(cache.default_ttl, 86_400);
        assert_eq!(cache.max_ttl, 31_536_000);
        assert_eq!(cache.min_ttl, 1);
        assert_eq!(cache.query_string_whitelist, vec!["etag"]);
        assert!(!cache.accept_encoding_gzip);
        assert!(!cache.accept_encoding_brotli);

        let origin = OriginRequestPolicyConfig::default();
        assert_eq!(origin.header_whitelist, vec!["Content-Type"]);
        assert_eq!(origin.query_string_whitelist, vec!["partNumber", "uploadId"]);
    }

    #[test]
    fn test_key_parameter_name_derived_from_domain() {
        let config = StackConfig::new(DomainName::parse("files.example.com").unwrap());
        assert_eq!(config.key_parameter_name, "/filehost/files.example.com/signing-key");
        assert_eq!(config.access_mode, AccessMode::ReadOnly);
        assert!(config.existing_bucket.is_none());
    }
}
