//! filehost-agent
//!
//! Provisions a secure static file hosting stack: an object-store bucket,
//! a CDN distribution in front of it, a DNS-validated TLS certificate for
//! a custom domain, a signed-URL key pair, and the DNS records and bucket
//! policy tying it all together.
//!
//! The interesting parts are the orchestration, not the cloud resources:
//! [`zone::ZoneResolver`] finds the narrowest hosted zone owning a
//! domain, and [`stack::StackOrchestrator`] runs the provisioning steps
//! as a dependency graph so the certificate and key-material branches
//! proceed concurrently while the distribution waits on both.

pub mod certificate;
pub mod config;
pub mod domain;
pub mod error;
pub mod keys;
pub mod policy;
pub mod providers;
pub mod stack;
pub mod zone;

pub use config::{AccessMode, StackConfig};
pub use domain::DomainName;
pub use error::ProvisionError;
pub use stack::{Providers, StackOrchestrator, StackOutputs, StackReport};
