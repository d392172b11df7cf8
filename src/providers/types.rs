//! Provider resource types
//!
//! Identifiers and request/response payloads shared by the collaborator
//! contracts. Identifiers are opaque newtypes so a zone id can never be
//! passed where a distribution id belongs.

use serde::{Deserialize, Serialize};

macro_rules! resource_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

resource_id!(
    /// Identifier of a hosted DNS zone
    ZoneId
);
resource_id!(
    /// ARN of a requested or validated certificate
    CertificateArn
);
resource_id!(
    /// Identifier of a CDN distribution
    DistributionId
);
resource_id!(
    /// Registration identifier of a public key at the CDN
    PublicKeyId
);
resource_id!(
    /// Identifier of a CDN trusted key group
    KeyGroupId
);
resource_id!(
    /// Identifier of an auxiliary CDN resource (access control, policies)
    ResourceId
);

/// A bucket and the regional endpoint the CDN uses as its origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub regional_domain_name: String,
}

/// Public access block flags for a bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    /// All four flags on; the only configuration this stack uses
    pub fn block_all() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

/// DNS record types this stack creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::Aaaa => write!(f, "AAAA"),
            RecordType::Cname => write!(f, "CNAME"),
            RecordType::Txt => write!(f, "TXT"),
        }
    }
}

/// Record payload: plain values with a TTL, or an alias to another
/// provider-managed name (the distribution's domain)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordData {
    Values {
        ttl: u32,
        values: Vec<String>,
    },
    Alias {
        target_domain: String,
        target_zone: ZoneId,
        evaluate_target_health: bool,
    },
}

/// A DNS record to create in a hosted zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSpec {
    pub name: String,
    pub record_type: RecordType,
    pub data: RecordData,
}

/// One DNS record the CA requires to prove domain control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOption {
    pub name: String,
    pub record_type: RecordType,
    pub value: String,
}

/// A requested certificate and its pending validation options
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub arn: CertificateArn,
    pub validation_options: Vec<ValidationOption>,
}

/// Terminal state of certificate validation at the CA
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Validated,
    Failed(String),
}

/// Origin access control parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginAccessControlSpec {
    pub description: String,
    pub origin_type: String,
    pub signing_behavior: String,
    pub signing_protocol: String,
}

impl Default for OriginAccessControlSpec {
    fn default() -> Self {
        Self {
            description: "Origin access control for file hosting".to_string(),
            origin_type: "s3".to_string(),
            signing_behavior: "always".to_string(),
            signing_protocol: "sigv4".to_string(),
        }
    }
}

/// Everything the CDN control plane needs to create the distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSpec {
    pub caller_reference: String,
    pub comment: String,
    pub aliases: Vec<String>,
    pub origin_domain_name: String,
    pub origin_id: String,
    pub origin_access_control: ResourceId,
    pub cache_policy: ResourceId,
    pub origin_request_policy: ResourceId,
    pub response_headers_policy_id: String,
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub viewer_protocol_policy: String,
    pub compress: bool,
    pub price_class: String,
    pub certificate: CertificateArn,
    pub ssl_support_method: String,
    pub minimum_protocol_version: String,
    pub trusted_key_groups: Vec<KeyGroupId>,
    pub ipv6_enabled: bool,
    pub geo_restriction: String,
}

/// The created distribution and the identity needed downstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionInfo {
    pub id: DistributionId,
    /// The distribution's stable domain name, target of the DNS alias
    pub domain_name: String,
    /// The provider-owned hosted zone the alias record points into
    pub hosted_zone: ZoneId,
    /// Account that owns the distribution; named by the bucket policy
    pub account_id: String,
}
