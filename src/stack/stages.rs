//! Provisioning stages
//!
//! The named stages a stack run moves through, each with declared
//! prerequisites, and a shared log recording stage entry in order.
//! Marking a stage whose prerequisites have not all been entered is a
//! contract violation inside the graph and fails the run.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Named stages of a stack provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    BucketReady,
    CertRequested,
    CertValidated,
    KeyMaterialReady,
    DistributionActive,
    DnsAliasCreated,
    PolicyAttached,
    Done,
}

impl Stage {
    /// Stages that must all have been entered before this one
    pub fn prerequisites(self) -> &'static [Stage] {
        match self {
            Stage::Init => &[],
            Stage::BucketReady => &[Stage::Init],
            Stage::CertRequested => &[Stage::BucketReady],
            Stage::CertValidated => &[Stage::CertRequested],
            Stage::KeyMaterialReady => &[Stage::BucketReady],
            Stage::DistributionActive => &[Stage::CertValidated, Stage::KeyMaterialReady],
            Stage::DnsAliasCreated => &[Stage::DistributionActive],
            Stage::PolicyAttached => &[Stage::DistributionActive],
            Stage::Done => &[Stage::DnsAliasCreated, Stage::PolicyAttached],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::BucketReady => "bucket_ready",
            Stage::CertRequested => "cert_requested",
            Stage::CertValidated => "cert_validated",
            Stage::KeyMaterialReady => "key_material_ready",
            Stage::DistributionActive => "distribution_active",
            Stage::DnsAliasCreated => "dns_alias_created",
            Stage::PolicyAttached => "policy_attached",
            Stage::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One stage entry with its timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: Stage,
    pub at: DateTime<Utc>,
}

/// Ordered record of stage entries, shared across provisioning tasks
#[derive(Clone)]
pub struct StageLog {
    entries: Arc<Mutex<Vec<StageEntry>>>,
}

impl StageLog {
    /// A fresh log, already in `Init`
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(vec![StageEntry {
                stage: Stage::Init,
                at: Utc::now(),
            }])),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StageEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record entry into `stage`, verifying all prerequisites were entered
    pub fn mark(&self, stage: Stage) -> Result<(), ProvisionError> {
        let mut entries = self.lock();
        for prerequisite in stage.prerequisites() {
            if !entries.iter().any(|e| e.stage == *prerequisite) {
                return Err(ProvisionError::DependencyNotReady(prerequisite.name()));
            }
        }
        entries.push(StageEntry {
            stage,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Snapshot of the entries so far, in entry order
    pub fn entries(&self) -> Vec<StageEntry> {
        self.lock().clone()
    }

    /// Position of a stage in the entry order, if entered
    pub fn position(&self, stage: Stage) -> Option<usize> {
        self.lock().iter().position(|e| e.stage == stage)
    }
}

impl Default for StageLog {
    fn default() -> Self {
        Self::new()
    }
}
