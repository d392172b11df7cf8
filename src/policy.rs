//! Bucket access policy
//!
//! Derives the object-store policy that lets exactly one CDN distribution
//! read (and optionally write) the bucket. The source-ARN condition is
//! the sole authorization boundary: it names the distribution by id, so
//! no other distribution, in any account, can present the bucket's
//! objects. The policy can only be built after the distribution exists.

use serde::{Deserialize, Serialize};

use crate::config::AccessMode;
use crate::providers::types::DistributionId;

/// IAM policy language version
const POLICY_VERSION: &str = "2012-10-17";

/// The CDN service principal granted access
const CDN_SERVICE_PRINCIPAL: &str = "cloudfront.amazonaws.com";

/// A bucket policy document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyStatement {
    #[serde(rename = "Effect")]
    pub effect: String,
    #[serde(rename = "Principal")]
    pub principal: Principal,
    #[serde(rename = "Action")]
    pub action: Vec<String>,
    #[serde(rename = "Resource")]
    pub resource: Vec<String>,
    #[serde(rename = "Condition")]
    pub condition: Condition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    #[serde(rename = "Service")]
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    #[serde(rename = "StringEquals")]
    pub string_equals: SourceArnMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceArnMatch {
    #[serde(rename = "AWS:SourceArn")]
    pub source_arn: String,
}

/// Builds the bucket policy scoped to one distribution
pub struct AccessPolicyBuilder {
    partition: String,
    access_mode: AccessMode,
}

impl AccessPolicyBuilder {
    pub fn new(access_mode: AccessMode) -> Self {
        Self {
            partition: "aws".to_string(),
            access_mode,
        }
    }

    /// Override the ARN partition (e.g. `aws-cn`)
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Build the policy for `bucket`, authorizing only `distribution`
    /// owned by `account_id`.
    pub fn build(
        &self,
        bucket: &str,
        distribution: &DistributionId,
        account_id: &str,
    ) -> PolicyDocument {
        let mut action = vec!["s3:GetObject".to_string()];
        if self.access_mode == AccessMode::ReadWrite {
            action.push("s3:PutObject".to_string());
        }

        PolicyDocument {
            version: POLICY_VERSION.to_string(),
            statement: vec![PolicyStatement {
                effect: "Allow".to_string(),
                principal: Principal {
                    service: CDN_SERVICE_PRINCIPAL.to_string(),
                },
                action,
                resource: vec![format!("arn:{}:s3:::{}/*", self.partition, bucket)],
                condition: Condition {
                    string_equals: SourceArnMatch {
                        source_arn: format!(
                            "arn:{}:cloudfront::{}:distribution/{}",
                            self.partition, account_id, distribution
                        ),
                    },
                },
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_names_exact_bucket_and_distribution() {
        let builder = AccessPolicyBuilder::new(AccessMode::ReadOnly);
        let policy = builder.build(
            "my-bucket",
            &DistributionId::new("E2EXAMPLE99"),
            "123456789012",
        );

        let statement = &policy.statement[0];
        assert_eq!(statement.resource, vec!["arn:aws:s3:::my-bucket/*"]);
        assert_eq!(
            statement.condition.string_equals.source_arn,
            "arn:aws:cloudfront::123456789012:distribution/E2EXAMPLE99"
        );
        assert_eq!(statement.principal.service, "cloudfront.amazonaws.com");
        assert_eq!(statement.action, vec!["s3:GetObject"]);
    }

    #[test]
    fn test_read_write_mode_adds_put_object() {
        let builder = AccessPolicyBuilder::new(AccessMode::ReadWrite);
        let policy = builder.build(
            "my-bucket",
            &DistributionId::new("E2EXAMPLE99"),
            "123456789012",
        );
        assert_eq!(
            policy.statement[0].action,
            vec!["s3:GetObject", "s3:PutObject"]
        );
    }

    #[test]
    fn test_serialized_policy_round_trips_without_wildcards() {
        let builder = AccessPolicyBuilder::new(AccessMode::ReadOnly);
        let policy = builder.build(
            "bucket-b",
            &DistributionId::new("EDISTD"),
            "999999999999",
        );

        let json = serde_json::to_string(&policy).unwrap();
        let parsed: PolicyDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, policy);
        assert_eq!(parsed.version, "2012-10-17");
        assert_eq!(parsed.statement[0].resource, vec!["arn:aws:s3:::bucket-b/*"]);
        assert_eq!(
            parsed.statement[0].condition.string_equals.source_arn,
            "arn:aws:cloudfront::999999999999:distribution/EDISTD"
        );

        // The only `*` is the object suffix inside the bucket ARN; the
        // condition never wildcards the distribution
        assert!(!parsed.statement[0]
            .condition
            .string_equals
            .source_arn
            .contains('*'));
    }

    #[test]
    fn test_partition_override_flows_into_both_arns() {
        let builder = AccessPolicyBuilder::new(AccessMode::ReadOnly).with_partition("aws-cn");
        let policy = builder.build("b", &DistributionId::new("E1"), "1");
        assert!(policy.statement[0].resource[0].starts_with("arn:aws-cn:s3"));
        assert!(policy.statement[0]
            .condition
            .string_equals
            .source_arn
            .starts_with("arn:aws-cn:cloudfront"));
    }
}
