//! Collaborator contracts
//!
//! Trait-based abstractions over the external cloud services the stack
//! provisioner drives: object store, DNS provider, certificate authority,
//! CDN control plane, and secret store. The orchestration core only
//! depends on these traits; live and in-memory backends implement them.

pub mod cloudflare;
pub mod memory;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{CachePolicyConfig, OriginRequestPolicyConfig};
use crate::keys::PrivateKeyPem;
use types::{
    BucketInfo, CertificateArn, CertificateRequest, DistributionInfo, DistributionSpec,
    KeyGroupId, OriginAccessControlSpec, PublicAccessBlock, PublicKeyId, RecordSpec, ResourceId,
    ValidationOutcome, ZoneId,
};

/// Object store contract: bucket lifecycle, hardening, and policy
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a fresh bucket for the stack
    async fn create_bucket(&self) -> Result<BucketInfo>;

    /// Look up an existing bucket by name, for the existing-bucket variant
    async fn lookup_bucket(&self, name: &str) -> Result<BucketInfo>;

    /// Apply object ownership controls (e.g. `BucketOwnerEnforced`)
    async fn set_ownership_controls(&self, bucket: &str, object_ownership: &str) -> Result<()>;

    /// Apply the public access block configuration
    async fn set_public_access_block(&self, bucket: &str, block: PublicAccessBlock) -> Result<()>;

    /// Attach the serialized access policy document to the bucket
    async fn attach_policy(&self, bucket: &str, policy_document: &str) -> Result<()>;
}

/// DNS provider contract: zone lookup and record creation
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up a hosted zone by its exact trailing-dot name.
    /// `Ok(None)` is a miss, not a failure.
    async fn lookup_zone(&self, name: &str) -> Result<Option<ZoneId>>;

    /// Create a record in the given zone
    async fn create_record(&self, zone: &ZoneId, record: &RecordSpec) -> Result<()>;
}

/// Certificate authority contract: request and DNS-validate certificates
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Request a DNS-validated certificate for the domain
    async fn request_certificate(&self, domain: &str) -> Result<CertificateRequest>;

    /// Drive validation to a terminal state. Polling and timeout are the
    /// collaborator's concern; callers only sequence the dependency.
    async fn await_validation(&self, certificate: &CertificateArn) -> Result<ValidationOutcome>;
}

/// CDN control plane contract: distribution and its supporting resources
#[async_trait]
pub trait CdnControlPlane: Send + Sync {
    async fn create_origin_access_control(
        &self,
        spec: &OriginAccessControlSpec,
    ) -> Result<ResourceId>;

    async fn create_cache_policy(&self, config: &CachePolicyConfig) -> Result<ResourceId>;

    async fn create_origin_request_policy(
        &self,
        config: &OriginRequestPolicyConfig,
    ) -> Result<ResourceId>;

    /// Register a public key (PEM) as a trusted signer
    async fn register_public_key(&self, public_key_pem: &str) -> Result<PublicKeyId>;

    /// Wrap registered keys into a key group distributions can trust
    async fn create_key_group(&self, key_ids: &[PublicKeyId]) -> Result<KeyGroupId>;

    async fn create_distribution(&self, spec: &DistributionSpec) -> Result<DistributionInfo>;
}

/// Secret store contract: write-once encrypted parameters
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Persist the private key as an encrypted parameter, consuming it.
    /// Returns the parameter name callers may hand to downstream consumers.
    async fn put_secure_parameter(&self, name: &str, value: PrivateKeyPem) -> Result<String>;
}
