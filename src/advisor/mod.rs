//! Advisory API abstraction: the only thing the refresh pipeline knows
//! about where check data comes from.
//!
//! The production implementation talks to the AWS Support API
//! (`support.rs`); tests use an in-memory fake.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::AdvisorError;

pub mod support;

// ── Core Types ──────────────────────────────────────────────────────

/// A single advisory rule as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub id: String,
    pub name: String,
    pub category: String,
}

impl Check {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
        }
    }
}

/// The fixed set of statuses a check result can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
    NotAvailable,
}

impl CheckStatus {
    pub const ALL: [CheckStatus; 4] = [
        CheckStatus::Ok,
        CheckStatus::Warning,
        CheckStatus::Error,
        CheckStatus::NotAvailable,
    ];

    /// Wire / label representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "ok",
            CheckStatus::Warning => "warning",
            CheckStatus::Error => "error",
            CheckStatus::NotAvailable => "not_available",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AdvisorError::UnknownStatus(s.to_string()))
    }
}

/// Latest evaluation of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: CheckStatus,
    /// Number of flagged resources, when the API reports any.
    pub flagged_resources: Option<u64>,
}

impl CheckResult {
    /// Value exported for this result: the flagged count, or 0.
    pub fn magnitude(&self) -> f64 {
        self.flagged_resources.unwrap_or(0) as f64
    }
}

// ── API Trait ───────────────────────────────────────────────────────

/// Read-only view of the advisory service.
///
/// Implementations are shared by every pool worker at once and must be
/// safe for concurrent calls.
#[async_trait]
pub trait AdvisorApi: Send + Sync {
    /// List every check the service knows about.
    async fn list_checks(&self) -> Result<Vec<Check>, AdvisorError>;

    /// Fetch the latest result of one check.
    async fn check_result(&self, check_id: &str) -> Result<CheckResult, AdvisorError>;
}

// ── Test Fake ───────────────────────────────────────────────────────
