//! Error taxonomy for stack provisioning
//!
//! Every failure surfaces to the orchestrator's caller immediately; nothing
//! is retried here. Retry and backoff belong to whatever engine drives the
//! provisioning run.

use thiserror::Error;

/// Errors that can occur while provisioning a file hosting stack
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The domain name supplied to the stack is not usable
    #[error("invalid domain name: {0}")]
    InvalidDomain(String),

    /// Zone resolution exhausted every ancestor candidate
    #[error("no hosted zone found for domain {0}")]
    NoZoneFound(String),

    /// The certificate authority rejected the request or timed out
    #[error("certificate issuance failed for {domain}: {reason}")]
    IssuanceFailure { domain: String, reason: String },

    /// The DNS validation record could not be created
    #[error("validation record conflict at {record}: {reason}")]
    ValidationRecordConflict { record: String, reason: String },

    /// Generating the signing key pair failed
    #[error("key generation failed: {0}")]
    KeyGenerationFailure(String),

    /// Registering the public key or key group with the CDN failed
    #[error("key registration failed: {0}")]
    KeyRegistrationFailure(String),

    /// Attaching the bucket policy failed
    #[error("bucket policy attachment failed: {0}")]
    PolicyAttachmentFailure(String),

    /// A task consumed a dependency edge that was never fulfilled, or a
    /// stage was entered before its prerequisites. This is a contract
    /// violation inside the provisioning graph, not a user-recoverable
    /// condition.
    #[error("dependency '{0}' was not ready")]
    DependencyNotReady(&'static str),

    /// A provisioning task stopped without reporting a typed failure
    #[error("internal provisioning failure: {0}")]
    Internal(String),

    /// Any other collaborator failure (bucket, distribution, records)
    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ProvisionError {
    /// Wrap a collaborator failure with the operation that was in flight.
    pub fn provider(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Provider {
            context: context.into(),
            source,
        }
    }
}
