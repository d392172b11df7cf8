//! Certificate issuance and DNS validation
//!
//! Requests a DNS-validated certificate, publishes the CA's validation
//! record in the owning hosted zone, then awaits the terminal validation
//! state. Validation must not be awaited before the record exists; that
//! ordering is the whole contract of this component.

use tracing::info;

use crate::domain::DomainName;
use crate::error::ProvisionError;
use crate::providers::types::{
    CertificateArn, RecordData, RecordSpec, ValidationOutcome, ZoneId,
};
use crate::providers::{CertificateAuthority, DnsProvider};

/// TTL for the CA's validation record
const VALIDATION_RECORD_TTL: u32 = 300;

/// A certificate the CA has confirmed as validated
#[derive(Debug, Clone)]
pub struct ValidatedCertificate {
    pub arn: CertificateArn,
}

/// Issues and validates certificates for one stack
pub struct CertificateIssuer<'a> {
    ca: &'a dyn CertificateAuthority,
    dns: &'a dyn DnsProvider,
}

impl<'a> CertificateIssuer<'a> {
    pub fn new(ca: &'a dyn CertificateAuthority, dns: &'a dyn DnsProvider) -> Self {
        Self { ca, dns }
    }

    /// Request a certificate for `domain` and drive DNS validation to
    /// completion in `zone`.
    ///
    /// Only the first validation option is consumed; a certificate with
    /// multiple subject alternative names is not handled.
    pub async fn issue(
        &self,
        domain: &DomainName,
        zone: &ZoneId,
    ) -> Result<ValidatedCertificate, ProvisionError> {
        let request = self
            .ca
            .request_certificate(domain.as_str())
            .await
            .map_err(|e| ProvisionError::IssuanceFailure {
                domain: domain.to_string(),
                reason: e.to_string(),
            })?;

        let option = request.validation_options.first().ok_or_else(|| {
            ProvisionError::IssuanceFailure {
                domain: domain.to_string(),
                reason: "certificate authority returned no validation options".to_string(),
            }
        })?;

        info!(
            domain = %domain,
            certificate = %request.arn,
            record = %option.name,
            "Certificate requested, publishing validation record"
        );

        let record = RecordSpec {
            name: option.name.clone(),
            record_type: option.record_type,
            data: RecordData::Values {
                ttl: VALIDATION_RECORD_TTL,
                values: vec![option.value.clone()],
            },
        };
        self.dns.create_record(zone, &record).await.map_err(|e| {
            ProvisionError::ValidationRecordConflict {
                record: option.name.clone(),
                reason: e.to_string(),
            }
        })?;

        // The record exists; now the CA may observe it
        match self.ca.await_validation(&request.arn).await {
            Ok(ValidationOutcome::Validated) => {
                info!(certificate = %request.arn, "Certificate validated");
                Ok(ValidatedCertificate { arn: request.arn })
            }
            Ok(ValidationOutcome::Failed(reason)) => Err(ProvisionError::IssuanceFailure {
                domain: domain.to_string(),
                reason,
            }),
            Err(e) => Err(ProvisionError::IssuanceFailure {
                domain: domain.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::MemoryCloud;
    use crate::providers::types::RecordType;

    #[tokio::test]
    async fn test_validation_record_created_before_awaiting_validation() {
        let cloud = MemoryCloud::new();
        let zone = cloud.register_zone("example.com");
        let issuer = CertificateIssuer::new(&cloud, &cloud);
        let domain = DomainName::parse("files.example.com").unwrap();

        let certificate = issuer.issue(&domain, &zone).await.unwrap();
        assert!(certificate.arn.as_str().starts_with("arn:aws:acm:"));

        let actions = cloud.actions();
        let request_idx = actions
            .iter()
            .position(|a| a.starts_with("request_certificate"))
            .unwrap();
        let record_idx = actions
            .iter()
            .position(|a| a.starts_with("create_record"))
            .unwrap();
        let await_idx = actions
            .iter()
            .position(|a| a.starts_with("await_validation"))
            .unwrap();
        assert!(request_idx < record_idx);
        assert!(record_idx < await_idx);
    }

    #[tokio::test]
    async fn test_validation_record_uses_first_option_with_fixed_ttl() {
        let cloud = MemoryCloud::new();
        let zone = cloud.register_zone("example.com");
        let issuer = CertificateIssuer::new(&cloud, &cloud);
        let domain = DomainName::parse("files.example.com").unwrap();

        issuer.issue(&domain, &zone).await.unwrap();

        let records = cloud.records();
        assert_eq!(records.len(), 1);
        let (record_zone, record) = &records[0];
        assert_eq!(record_zone, &zone);
        assert_eq!(record.record_type, RecordType::Cname);
        assert!(record.name.contains("files.example.com"));
        match &record.data {
            RecordData::Values { ttl, values } => {
                assert_eq!(*ttl, 300);
                assert_eq!(values.len(), 1);
            }
            other => panic!("expected plain values, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_record_conflict_surfaces_as_validation_record_conflict() {
        let cloud = MemoryCloud::new();
        let zone = cloud.register_zone("example.com");
        cloud.fail("create_record", "record already exists with different value");
        let issuer = CertificateIssuer::new(&cloud, &cloud);
        let domain = DomainName::parse("files.example.com").unwrap();

        let err = issuer.issue(&domain, &zone).await.unwrap_err();
        assert!(matches!(err, ProvisionError::ValidationRecordConflict { .. }));

        // Validation was never awaited for an unpublished record
        assert!(cloud.actions().iter().all(|a| !a.starts_with("await_validation")));
    }

    #[tokio::test]
    async fn test_failed_validation_surfaces_as_issuance_failure() {
        let cloud = MemoryCloud::new();
        let zone = cloud.register_zone("example.com");
        cloud.fail("validation_outcome", "CAA record forbids issuance");
        let issuer = CertificateIssuer::new(&cloud, &cloud);
        let domain = DomainName::parse("files.example.com").unwrap();

        let err = issuer.issue(&domain, &zone).await.unwrap_err();
        match err {
            ProvisionError::IssuanceFailure { domain, reason } => {
                assert_eq!(domain, "files.example.com");
                assert!(reason.contains("CAA"));
            }
            other => panic!("expected issuance failure, got {other}"),
        }
    }
}
