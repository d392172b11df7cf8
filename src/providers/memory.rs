//! In-memory collaborators
//!
//! A simulated cloud backing `plan` runs and unit tests. Every operation
//! appends to an ordered action log; per-operation delays and failures
//! can be injected to exercise interleavings and error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{CachePolicyConfig, OriginRequestPolicyConfig};
use crate::keys::PrivateKeyPem;

use super::types::{
    BucketInfo, CertificateArn, CertificateRequest, DistributionId, DistributionInfo,
    DistributionSpec, KeyGroupId, OriginAccessControlSpec, PublicAccessBlock, PublicKeyId,
    RecordSpec, RecordType, ResourceId, ValidationOption, ValidationOutcome, ZoneId,
};
use super::{CdnControlPlane, CertificateAuthority, DnsProvider, ObjectStore, SecretStore};

/// Hosted zone id CDN distributions share for alias targets
const DISTRIBUTION_ALIAS_ZONE: &str = "Z2FDTNDATAQYW2";

struct Inner {
    zones: Mutex<HashMap<String, ZoneId>>,
    failing_zone_lookups: Mutex<Vec<String>>,
    records: Mutex<Vec<(ZoneId, RecordSpec)>>,
    secrets: Mutex<HashMap<String, String>>,
    attached_policies: Mutex<HashMap<String, String>>,
    public_keys: Mutex<HashMap<PublicKeyId, String>>,
    actions: Mutex<Vec<String>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    failures: Mutex<HashMap<&'static str, String>>,
    account_id: String,
    sequence: AtomicU64,
}

/// Simulated cloud implementing all five collaborator contracts
#[derive(Clone)]
pub struct MemoryCloud {
    inner: Arc<Inner>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                zones: Mutex::new(HashMap::new()),
                failing_zone_lookups: Mutex::new(Vec::new()),
                records: Mutex::new(Vec::new()),
                secrets: Mutex::new(HashMap::new()),
                attached_policies: Mutex::new(HashMap::new()),
                public_keys: Mutex::new(HashMap::new()),
                actions: Mutex::new(Vec::new()),
                delays: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                account_id: "123456789012".to_string(),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(&self) -> u64 {
        self.inner.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a hosted zone; `name` may be given with or without the
    /// trailing dot
    pub fn register_zone(&self, name: &str) -> ZoneId {
        let normalized = format!("{}.", name.trim_end_matches('.'));
        let zone_id = ZoneId::new(format!("Z{:010}", self.next_id()));
        self.lock(&self.inner.zones).insert(normalized, zone_id.clone());
        zone_id
    }

    /// Make `lookup_zone` error (not miss) for this exact candidate name
    pub fn fail_zone_lookup(&self, name: &str) {
        self.lock(&self.inner.failing_zone_lookups)
            .push(format!("{}.", name.trim_end_matches('.')));
    }

    /// Inject a delay before the named operation completes
    pub fn delay(&self, operation: &'static str, duration: Duration) {
        self.lock(&self.inner.delays).insert(operation, duration);
    }

    /// Make the named operation fail with the given message
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.lock(&self.inner.failures)
            .insert(operation, message.to_string());
    }

    /// The ordered log of every operation performed
    pub fn actions(&self) -> Vec<String> {
        self.lock(&self.inner.actions).clone()
    }

    /// Records created so far, across all zones
    pub fn records(&self) -> Vec<(ZoneId, RecordSpec)> {
        self.lock(&self.inner.records).clone()
    }

    /// The policy document attached to a bucket, if any
    pub fn attached_policy(&self, bucket: &str) -> Option<String> {
        self.lock(&self.inner.attached_policies).get(bucket).cloned()
    }

    /// A stored secure parameter, by name (test inspection only)
    pub fn stored_secret(&self, name: &str) -> Option<String> {
        self.lock(&self.inner.secrets).get(name).cloned()
    }

    /// The PEM registered under a public key id
    pub fn registered_public_key(&self, id: &PublicKeyId) -> Option<String> {
        self.lock(&self.inner.public_keys).get(id).cloned()
    }

    /// Honor injected delay/failure for an operation, then log it
    async fn perform(&self, operation: &'static str, detail: String) -> Result<()> {
        let delay = self.lock(&self.inner.delays).get(operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.lock(&self.inner.failures).get(operation).cloned() {
            self.lock(&self.inner.actions)
                .push(format!("{operation} failed: {message}"));
            bail!("{message}");
        }
        self.lock(&self.inner.actions).push(if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{operation} {detail}")
        });
        Ok(())
    }
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryCloud {
    async fn create_bucket(&self) -> Result<BucketInfo> {
        let name = format!("filehost-{}", Uuid::new_v4());
        self.perform("create_bucket", format!("name={name}")).await?;
        Ok(BucketInfo {
            regional_domain_name: format!("{name}.s3.us-east-1.amazonaws.com"),
            name,
        })
    }

    async fn lookup_bucket(&self, name: &str) -> Result<BucketInfo> {
        self.perform("lookup_bucket", format!("name={name}")).await?;
        Ok(BucketInfo {
            name: name.to_string(),
            regional_domain_name: format!("{name}.s3.us-east-1.amazonaws.com"),
        })
    }

    async fn set_ownership_controls(&self, bucket: &str, object_ownership: &str) -> Result<()> {
        self.perform(
            "set_ownership_controls",
            format!("bucket={bucket} rule={object_ownership}"),
        )
        .await
    }

    async fn set_public_access_block(&self, bucket: &str, block: PublicAccessBlock) -> Result<()> {
        self.perform(
            "set_public_access_block",
            format!(
                "bucket={bucket} block_acls={} block_policy={}",
                block.block_public_acls, block.block_public_policy
            ),
        )
        .await
    }

    async fn attach_policy(&self, bucket: &str, policy_document: &str) -> Result<()> {
        self.perform(
            "attach_policy",
            format!("bucket={bucket} bytes={}", policy_document.len()),
        )
        .await?;
        self.lock(&self.inner.attached_policies)
            .insert(bucket.to_string(), policy_document.to_string());
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for MemoryCloud {
    async fn lookup_zone(&self, name: &str) -> Result<Option<ZoneId>> {
        self.perform("lookup_zone", format!("name={name}")).await?;
        if self
            .lock(&self.inner.failing_zone_lookups)
            .iter()
            .any(|failing| failing == name)
        {
            bail!("zone lookup for {name} failed");
        }
        Ok(self.lock(&self.inner.zones).get(name).cloned())
    }

    async fn create_record(&self, zone: &ZoneId, record: &RecordSpec) -> Result<()> {
        self.perform(
            "create_record",
            format!("zone={zone} name={} type={}", record.name, record.record_type),
        )
        .await?;
        self.lock(&self.inner.records)
            .push((zone.clone(), record.clone()));
        Ok(())
    }
}

#[async_trait]
impl CertificateAuthority for MemoryCloud {
    async fn request_certificate(&self, domain: &str) -> Result<CertificateRequest> {
        self.perform("request_certificate", format!("domain={domain}"))
            .await?;
        let arn = CertificateArn::new(format!(
            "arn:aws:acm:us-east-1:{}:certificate/{}",
            self.inner.account_id,
            Uuid::new_v4()
        ));
        Ok(CertificateRequest {
            arn,
            validation_options: vec![ValidationOption {
                name: format!("_{:08x}.{domain}.", self.next_id()),
                record_type: RecordType::Cname,
                value: format!("_{:08x}.acm-validations.example.", self.next_id()),
            }],
        })
    }

    async fn await_validation(&self, certificate: &CertificateArn) -> Result<ValidationOutcome> {
        self.perform("await_validation", format!("certificate={certificate}"))
            .await?;
        if let Some(reason) = self
            .lock(&self.inner.failures)
            .get("validation_outcome")
            .cloned()
        {
            return Ok(ValidationOutcome::Failed(reason));
        }
        Ok(ValidationOutcome::Validated)
    }
}

#[async_trait]
impl CdnControlPlane for MemoryCloud {
    async fn create_origin_access_control(
        &self,
        spec: &OriginAccessControlSpec,
    ) -> Result<ResourceId> {
        self.perform(
            "create_origin_access_control",
            format!("protocol={}", spec.signing_protocol),
        )
        .await?;
        Ok(ResourceId::new(format!("OAC{:010}", self.next_id())))
    }

    async fn create_cache_policy(&self, config: &CachePolicyConfig) -> Result<ResourceId> {
        self.perform(
            "create_cache_policy",
            format!("default_ttl={}", config.default_ttl),
        )
        .await?;
        Ok(ResourceId::new(format!("CP{:010}", self.next_id())))
    }

    async fn create_origin_request_policy(
        &self,
        config: &OriginRequestPolicyConfig,
    ) -> Result<ResourceId> {
        self.perform(
            "create_origin_request_policy",
            format!("headers={}", config.header_whitelist.join(",")),
        )
        .await?;
        Ok(ResourceId::new(format!("ORP{:010}", self.next_id())))
    }

    async fn register_public_key(&self, public_key_pem: &str) -> Result<PublicKeyId> {
        self.perform("register_public_key", String::new()).await?;
        let key_id = PublicKeyId::new(format!("K{:010}", self.next_id()));
        self.lock(&self.inner.public_keys)
            .insert(key_id.clone(), public_key_pem.to_string());
        Ok(key_id)
    }

    async fn create_key_group(&self, key_ids: &[PublicKeyId]) -> Result<KeyGroupId> {
        let members: Vec<&str> = key_ids.iter().map(|id| id.as_str()).collect();
        self.perform("create_key_group", format!("keys={}", members.join(",")))
            .await?;
        Ok(KeyGroupId::new(format!("KG{:010}", self.next_id())))
    }

    async fn create_distribution(&self, spec: &DistributionSpec) -> Result<DistributionInfo> {
        self.perform(
            "create_distribution",
            format!(
                "aliases={} certificate={} key_groups={}",
                spec.aliases.join(","),
                spec.certificate,
                spec.trusted_key_groups.len()
            ),
        )
        .await?;
        let id = DistributionId::new(format!("E{:010X}", self.next_id()));
        Ok(DistributionInfo {
            domain_name: format!("{}.cloudfront.example.net", id.as_str().to_lowercase()),
            hosted_zone: ZoneId::new(DISTRIBUTION_ALIAS_ZONE),
            account_id: self.inner.account_id.clone(),
            id,
        })
    }
}

#[async_trait]
impl SecretStore for MemoryCloud {
    async fn put_secure_parameter(&self, name: &str, value: PrivateKeyPem) -> Result<String> {
        // The action log carries only the parameter name, never the value
        self.perform("put_secure_parameter", format!("name={name}"))
            .await?;
        self.lock(&self.inner.secrets)
            .insert(name.to_string(), value.expose().to_string());
        Ok(name.to_string())
    }
}
