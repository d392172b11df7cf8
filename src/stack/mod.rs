//! Stack orchestration
//!
//! Composes zone resolution, certificate issuance, key provisioning,
//! distribution creation, the DNS alias, and the bucket policy into a
//! dependency graph and runs it. Certificate validation and key material
//! provisioning are independent branches; the distribution waits on
//! both. The alias record and the bucket policy both wait on the
//! distribution and run concurrently with each other.

pub mod graph;
pub mod stages;

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::certificate::CertificateIssuer;
use crate::config::StackConfig;
use crate::error::ProvisionError;
use crate::keys::{KeyMaterial, KeyMaterialProvisioner};
use crate::policy::AccessPolicyBuilder;
use crate::providers::types::{
    BucketInfo, CertificateArn, DistributionInfo, DistributionSpec, OriginAccessControlSpec,
    PublicAccessBlock, RecordData, RecordSpec, RecordType, ZoneId,
};
use crate::providers::{
    CdnControlPlane, CertificateAuthority, DnsProvider, ObjectStore, SecretStore,
};
use crate::zone::ZoneResolver;

use graph::{edge, TaskGraph};
use stages::{Stage, StageEntry, StageLog};

/// Origin id under which the bucket appears in the distribution
const ORIGIN_ID: &str = "S3-origin";

/// Managed response headers policy: CORS with preflight
const CORS_PREFLIGHT_RESPONSE_HEADERS_POLICY: &str = "5cc3b908-e619-4b99-88e5-2cf7f45965bd";

/// Object ownership rule applied to the bucket
const BUCKET_OWNER_ENFORCED: &str = "BucketOwnerEnforced";

/// The collaborator set a stack run drives
#[derive(Clone)]
pub struct Providers {
    pub object_store: Arc<dyn ObjectStore>,
    pub dns: Arc<dyn DnsProvider>,
    pub certificate_authority: Arc<dyn CertificateAuthority>,
    pub cdn: Arc<dyn CdnControlPlane>,
    pub secrets: Arc<dyn SecretStore>,
}

/// Public outputs of a provisioned stack; the only values downstream
/// consumers receive
#[derive(Debug, Clone, Serialize)]
pub struct StackOutputs {
    /// The custom domain the stack serves
    pub url: String,
    /// Secret-store parameter holding the signed-URL private key
    pub private_key_parameter_name: String,
    /// Registration id of the public key at the CDN
    pub public_key_id: String,
}

/// Outputs plus the recorded stage entries for one run
#[derive(Debug, Clone, Serialize)]
pub struct StackReport {
    pub outputs: StackOutputs,
    pub stages: Vec<StageEntry>,
}

/// Orchestrates one stack provisioning run
pub struct StackOrchestrator {
    config: StackConfig,
    providers: Providers,
    stages: StageLog,
}

impl StackOrchestrator {
    pub fn new(config: StackConfig, providers: Providers) -> Self {
        Self {
            config,
            providers,
            stages: StageLog::new(),
        }
    }

    /// The stage log for this run; shared with tests and reports
    pub fn stages(&self) -> &StageLog {
        &self.stages
    }

    /// Provision the full stack.
    ///
    /// The first failure aborts the run and is surfaced as-is; resources
    /// already created are left in place for the driving engine to
    /// reconcile or tear down.
    pub async fn provision(&self) -> Result<StackReport, ProvisionError> {
        let domain = self.config.domain.clone();
        info!(domain = %domain, "Provisioning file hosting stack");

        let (bucket_tx, bucket_rx) = edge::<BucketInfo>("bucket");
        let (zone_tx, zone_rx) = edge::<ZoneId>("hosted-zone");
        let (cert_tx, cert_rx) = edge::<CertificateArn>("validated-certificate");
        let (keys_tx, keys_rx) = edge::<KeyMaterial>("key-material");
        let (dist_tx, dist_rx) = edge::<DistributionInfo>("distribution");

        let keys_out = keys_rx.clone();
        let mut graph = TaskGraph::new();

        // Bucket: create or look up, then harden before anything
        // references it
        {
            let store = self.providers.object_store.clone();
            let existing = self.config.existing_bucket.clone();
            let stages = self.stages.clone();
            graph.add("bucket", async move {
                let bucket = match existing {
                    Some(name) => store
                        .lookup_bucket(&name)
                        .await
                        .map_err(|e| ProvisionError::provider("looking up bucket", e))?,
                    None => store
                        .create_bucket()
                        .await
                        .map_err(|e| ProvisionError::provider("creating bucket", e))?,
                };
                store
                    .set_ownership_controls(&bucket.name, BUCKET_OWNER_ENFORCED)
                    .await
                    .map_err(|e| ProvisionError::provider("setting ownership controls", e))?;
                store
                    .set_public_access_block(&bucket.name, PublicAccessBlock::block_all())
                    .await
                    .map_err(|e| ProvisionError::provider("blocking public access", e))?;
                stages.mark(Stage::BucketReady)?;
                bucket_tx.fulfill(bucket);
                Ok(())
            });
        }

        // Hosted zone: resolve the narrowest zone owning the domain
        {
            let dns = self.providers.dns.clone();
            let domain = domain.clone();
            graph.add("hosted-zone", async move {
                let zone = ZoneResolver::new(dns.as_ref()).resolve(&domain).await?;
                zone_tx.fulfill(zone);
                Ok(())
            });
        }

        // Certificate: request and DNS-validate once the zone is known
        {
            let ca = self.providers.certificate_authority.clone();
            let dns = self.providers.dns.clone();
            let domain = domain.clone();
            let stages = self.stages.clone();
            let bucket_rx = bucket_rx.clone();
            let zone_rx = zone_rx.clone();
            graph.add("certificate", async move {
                bucket_rx.ready().await?;
                let zone = zone_rx.ready().await?;
                stages.mark(Stage::CertRequested)?;
                let certificate = CertificateIssuer::new(ca.as_ref(), dns.as_ref())
                    .issue(&domain, &zone)
                    .await?;
                stages.mark(Stage::CertValidated)?;
                cert_tx.fulfill(certificate.arn);
                Ok(())
            });
        }

        // Key material: independent of the certificate branch
        {
            let cdn = self.providers.cdn.clone();
            let secrets = self.providers.secrets.clone();
            let parameter_name = self.config.key_parameter_name.clone();
            let stages = self.stages.clone();
            let bucket_rx = bucket_rx.clone();
            graph.add("key-material", async move {
                bucket_rx.ready().await?;
                let material = KeyMaterialProvisioner::new(cdn.as_ref(), secrets.as_ref())
                    .provision(&parameter_name)
                    .await?;
                stages.mark(Stage::KeyMaterialReady)?;
                keys_tx.fulfill(material);
                Ok(())
            });
        }

        // Distribution: waits on the validated certificate and the key
        // group, plus the bucket origin
        {
            let cdn = self.providers.cdn.clone();
            let config = self.config.clone();
            let domain = domain.clone();
            let stages = self.stages.clone();
            let bucket_rx = bucket_rx.clone();
            let keys_rx = keys_rx.clone();
            graph.add("distribution", async move {
                let bucket = bucket_rx.ready().await?;
                let certificate = cert_rx.ready().await?;
                let keys = keys_rx.ready().await?;

                let origin_access_control = cdn
                    .create_origin_access_control(&OriginAccessControlSpec::default())
                    .await
                    .map_err(|e| ProvisionError::provider("creating origin access control", e))?;
                let cache_policy = cdn
                    .create_cache_policy(&config.cache_policy)
                    .await
                    .map_err(|e| ProvisionError::provider("creating cache policy", e))?;
                let origin_request_policy = cdn
                    .create_origin_request_policy(&config.origin_request_policy)
                    .await
                    .map_err(|e| ProvisionError::provider("creating origin request policy", e))?;

                let spec = DistributionSpec {
                    caller_reference: Uuid::new_v4().to_string(),
                    comment: "File hosting distribution".to_string(),
                    aliases: vec![domain.to_string()],
                    origin_domain_name: bucket.regional_domain_name,
                    origin_id: ORIGIN_ID.to_string(),
                    origin_access_control,
                    cache_policy,
                    origin_request_policy,
                    response_headers_policy_id: CORS_PREFLIGHT_RESPONSE_HEADERS_POLICY.to_string(),
                    allowed_methods: ["GET", "PUT", "POST", "PATCH", "DELETE", "HEAD", "OPTIONS"]
                        .map(String::from)
                        .to_vec(),
                    cached_methods: ["GET", "HEAD"].map(String::from).to_vec(),
                    viewer_protocol_policy: "redirect-to-https".to_string(),
                    compress: true,
                    price_class: "PriceClass_All".to_string(),
                    certificate,
                    ssl_support_method: "sni-only".to_string(),
                    minimum_protocol_version: "TLSv1.2_2021".to_string(),
                    trusted_key_groups: vec![keys.key_group_id],
                    ipv6_enabled: true,
                    geo_restriction: "none".to_string(),
                };
                let distribution = cdn
                    .create_distribution(&spec)
                    .await
                    .map_err(|e| ProvisionError::provider("creating distribution", e))?;
                stages.mark(Stage::DistributionActive)?;
                dist_tx.fulfill(distribution);
                Ok(())
            });
        }

        // Alias record: point the custom domain at the distribution
        {
            let dns = self.providers.dns.clone();
            let domain = domain.clone();
            let stages = self.stages.clone();
            let dist_rx = dist_rx.clone();
            graph.add("dns-alias", async move {
                let distribution = dist_rx.ready().await?;
                let zone = zone_rx.ready().await?;
                let record = RecordSpec {
                    name: domain.to_string(),
                    record_type: RecordType::A,
                    data: RecordData::Alias {
                        target_domain: distribution.domain_name,
                        target_zone: distribution.hosted_zone,
                        evaluate_target_health: true,
                    },
                };
                dns.create_record(&zone, &record)
                    .await
                    .map_err(|e| ProvisionError::provider("creating alias record", e))?;
                stages.mark(Stage::DnsAliasCreated)?;
                Ok(())
            });
        }

        // Bucket policy: scope access to exactly this distribution
        {
            let store = self.providers.object_store.clone();
            let access_mode = self.config.access_mode;
            let stages = self.stages.clone();
            graph.add("bucket-policy", async move {
                let distribution = dist_rx.ready().await?;
                let bucket = bucket_rx.ready().await?;
                let policy = AccessPolicyBuilder::new(access_mode).build(
                    &bucket.name,
                    &distribution.id,
                    &distribution.account_id,
                );
                let document = serde_json::to_string(&policy)
                    .map_err(|e| ProvisionError::Internal(e.to_string()))?;
                store
                    .attach_policy(&bucket.name, &document)
                    .await
                    .map_err(|e| ProvisionError::PolicyAttachmentFailure(e.to_string()))?;
                stages.mark(Stage::PolicyAttached)?;
                Ok(())
            });
        }

        graph.run().await?;
        self.stages.mark(Stage::Done)?;

        let keys = keys_out.ready().await?;
        let outputs = StackOutputs {
            url: domain.to_string(),
            private_key_parameter_name: keys.parameter_name,
            public_key_id: keys.public_key_id.to_string(),
        };
        info!(
            url = %outputs.url,
            public_key_id = %outputs.public_key_id,
            "Stack provisioned"
        );

        Ok(StackReport {
            outputs,
            stages: self.stages.entries(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessMode;
    use crate::domain::DomainName;
    use crate::providers::memory::MemoryCloud;
    use std::time::Duration;

    fn providers(cloud: &MemoryCloud) -> Providers {
        Providers {
            object_store: Arc::new(cloud.clone()),
            dns: Arc::new(cloud.clone()),
            certificate_authority: Arc::new(cloud.clone()),
            cdn: Arc::new(cloud.clone()),
            secrets: Arc::new(cloud.clone()),
        }
    }

    fn config(domain: &str) -> StackConfig {
        StackConfig::new(DomainName::parse(domain).unwrap())
    }

    fn assert_ordering_invariants(stages: &StageLog) {
        let position = |stage| stages.position(stage).expect("stage missing");
        assert!(position(Stage::DistributionActive) > position(Stage::CertValidated));
        assert!(position(Stage::DistributionActive) > position(Stage::KeyMaterialReady));
        assert!(position(Stage::DnsAliasCreated) > position(Stage::DistributionActive));
        assert!(position(Stage::PolicyAttached) > position(Stage::DistributionActive));
        assert!(position(Stage::Done) > position(Stage::DnsAliasCreated));
        assert!(position(Stage::Done) > position(Stage::PolicyAttached));
    }

    #[tokio::test]
    async fn test_full_provisioning_run() {
        let cloud = MemoryCloud::new();
        cloud.register_zone("example.com");

        let orchestrator = StackOrchestrator::new(config("files.example.com"), providers(&cloud));
        let report = orchestrator.provision().await.unwrap();

        assert_eq!(report.outputs.url, "files.example.com");
        assert_eq!(
            report.outputs.private_key_parameter_name,
            "/filehost/files.example.com/signing-key"
        );
        assert!(!report.outputs.public_key_id.is_empty());
        assert_ordering_invariants(orchestrator.stages());

        // Bucket hardening happened before the distribution referenced it
        let actions = cloud.actions();
        let harden_idx = actions
            .iter()
            .position(|a| a.starts_with("set_public_access_block"))
            .unwrap();
        let dist_idx = actions
            .iter()
            .position(|a| a.starts_with("create_distribution"))
            .unwrap();
        assert!(harden_idx < dist_idx);
    }

    #[tokio::test]
    async fn test_distribution_waits_for_slow_certificate() {
        let cloud = MemoryCloud::new();
        cloud.register_zone("example.com");
        cloud.delay("await_validation", Duration::from_millis(50));

        let orchestrator = StackOrchestrator::new(config("files.example.com"), providers(&cloud));
        orchestrator.provision().await.unwrap();

        // However the branches interleave, the distribution waited for
        // the delayed validation
        assert_ordering_invariants(orchestrator.stages());
    }

    #[tokio::test]
    async fn test_distribution_waits_for_slow_key_material() {
        let cloud = MemoryCloud::new();
        cloud.register_zone("example.com");
        cloud.delay("register_public_key", Duration::from_millis(50));

        let orchestrator = StackOrchestrator::new(config("files.example.com"), providers(&cloud));
        orchestrator.provision().await.unwrap();

        let stages = orchestrator.stages();
        assert!(stages.position(Stage::CertValidated) < stages.position(Stage::KeyMaterialReady));
        assert_ordering_invariants(stages);
    }

    #[tokio::test]
    async fn test_interleaving_does_not_change_outputs() {
        for slow_op in ["await_validation", "register_public_key"] {
            let cloud = MemoryCloud::new();
            cloud.register_zone("example.com");
            cloud.delay(slow_op, Duration::from_millis(30));

            let orchestrator =
                StackOrchestrator::new(config("files.example.com"), providers(&cloud));
            let report = orchestrator.provision().await.unwrap();
            assert_eq!(report.outputs.url, "files.example.com");
            assert_eq!(
                report.outputs.private_key_parameter_name,
                "/filehost/files.example.com/signing-key"
            );
            assert_ordering_invariants(orchestrator.stages());
        }
    }

    #[tokio::test]
    async fn test_existing_bucket_variant_skips_creation() {
        let cloud = MemoryCloud::new();
        cloud.register_zone("example.com");

        let config = config("files.example.com").with_existing_bucket("legacy-assets");
        let orchestrator = StackOrchestrator::new(config, providers(&cloud));
        orchestrator.provision().await.unwrap();

        let actions = cloud.actions();
        assert!(actions.iter().all(|a| !a.starts_with("create_bucket")));
        assert!(actions
            .iter()
            .any(|a| a.starts_with("lookup_bucket") && a.contains("legacy-assets")));
    }

    #[tokio::test]
    async fn test_alias_record_targets_distribution_in_resolved_zone() {
        let cloud = MemoryCloud::new();
        cloud.register_zone("example.com");
        let narrow = cloud.register_zone("files.example.com");

        let orchestrator = StackOrchestrator::new(config("a.files.example.com"), providers(&cloud));
        orchestrator.provision().await.unwrap();

        let alias = cloud
            .records()
            .into_iter()
            .find(|(_, r)| r.record_type == RecordType::A)
            .expect("no alias record");
        assert_eq!(alias.0, narrow);
        assert_eq!(alias.1.name, "a.files.example.com");
        match alias.1.data {
            RecordData::Alias {
                target_domain,
                evaluate_target_health,
                ..
            } => {
                assert!(target_domain.ends_with("cloudfront.example.net"));
                assert!(evaluate_target_health);
            }
            other => panic!("expected alias data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_attached_policy_names_the_created_distribution() {
        let cloud = MemoryCloud::new();
        cloud.register_zone("example.com");

        let config = config("files.example.com").with_access_mode(AccessMode::ReadWrite);
        let orchestrator = StackOrchestrator::new(config, providers(&cloud));
        orchestrator.provision().await.unwrap();

        let actions = cloud.actions();
        let bucket = actions
            .iter()
            .find(|a| a.starts_with("create_bucket"))
            .and_then(|a| a.strip_prefix("create_bucket name="))
            .unwrap()
            .to_string();
        let document = cloud.attached_policy(&bucket).unwrap();
        let parsed: crate::policy::PolicyDocument = serde_json::from_str(&document).unwrap();
        let statement = &parsed.statement[0];
        assert_eq!(statement.resource, vec![format!("arn:aws:s3:::{bucket}/*")]);
        assert!(statement
            .condition
            .string_equals
            .source_arn
            .starts_with("arn:aws:cloudfront::123456789012:distribution/E"));
        assert_eq!(statement.action, vec!["s3:GetObject", "s3:PutObject"]);

        // Policy attachment happened, and only after the distribution
        let dist_idx = actions
            .iter()
            .position(|a| a.starts_with("create_distribution"))
            .unwrap();
        let policy_idx = actions
            .iter()
            .position(|a| a.starts_with("attach_policy"))
            .unwrap();
        assert!(dist_idx < policy_idx);
    }

    #[tokio::test]
    async fn test_missing_zone_aborts_the_run() {
        let cloud = MemoryCloud::new();

        let orchestrator = StackOrchestrator::new(config("files.example.com"), providers(&cloud));
        let err = orchestrator.provision().await.unwrap_err();
        assert!(matches!(err, ProvisionError::NoZoneFound(_)));

        // Nothing downstream of the zone ran
        assert!(cloud
            .actions()
            .iter()
            .all(|a| !a.starts_with("create_distribution")));
    }

    #[tokio::test]
    async fn test_certificate_failure_surfaces_and_skips_distribution() {
        let cloud = MemoryCloud::new();
        cloud.register_zone("example.com");
        cloud.fail("validation_outcome", "domain not authorized");

        let orchestrator = StackOrchestrator::new(config("files.example.com"), providers(&cloud));
        let err = orchestrator.provision().await.unwrap_err();
        assert!(matches!(err, ProvisionError::IssuanceFailure { .. }));
        assert!(cloud
            .actions()
            .iter()
            .all(|a| !a.starts_with("create_distribution")));
    }

    #[tokio::test]
    async fn test_policy_attachment_failure_is_typed() {
        let cloud = MemoryCloud::new();
        cloud.register_zone("example.com");
        cloud.fail("attach_policy", "access denied");

        let orchestrator = StackOrchestrator::new(config("files.example.com"), providers(&cloud));
        let err = orchestrator.provision().await.unwrap_err();
        assert!(matches!(err, ProvisionError::PolicyAttachmentFailure(_)));
    }
}
