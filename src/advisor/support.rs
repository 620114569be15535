//! AWS Support API client for Trusted Advisor.
//! Implements the AdvisorApi trait.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_support::error::DisplayErrorContext;
use aws_sdk_support::Client;

use super::*;
use crate::error::AdvisorError;

/// Trusted Advisor data is only served from us-east-1.
pub const SUPPORT_REGION: &str = "us-east-1";

/// Trusted Advisor supports "en" and "ja"; names are exported in English.
pub const LANGUAGE: &str = "en";

pub struct SupportAdvisor {
    client: Client,
}

impl SupportAdvisor {
    /// Build a client from the default credential chain, pinned to the
    /// support region.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(SUPPORT_REGION))
            .load()
            .await;
        Self { client: Client::new(&config) }
    }
}

#[async_trait]
impl AdvisorApi for SupportAdvisor {
    async fn list_checks(&self) -> Result<Vec<Check>, AdvisorError> {
        let resp = self.client
            .describe_trusted_advisor_checks()
            .language(LANGUAGE)
            .send()
            .await
            .map_err(|e| AdvisorError::Api(DisplayErrorContext(&e).to_string()))?;

        Ok(resp.checks().iter()
            .map(|c| Check::new(c.id(), c.name(), c.category()))
            .collect())
    }

    async fn check_result(&self, check_id: &str) -> Result<CheckResult, AdvisorError> {
        let resp = self.client
            .describe_trusted_advisor_check_result()
            .check_id(check_id)
            .language(LANGUAGE)
            .send()
            .await
            .map_err(|e| AdvisorError::Api(DisplayErrorContext(&e).to_string()))?;

        let result = resp.result()
            .ok_or_else(|| AdvisorError::MissingResult(check_id.to_string()))?;

        Ok(CheckResult {
            status: result.status().parse()?,
            flagged_resources: Some(result.flagged_resources().len() as u64),
        })
    }
}
