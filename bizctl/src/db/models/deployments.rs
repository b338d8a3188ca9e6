//! Database models for deployments.

use crate::types::BusinessId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle state of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Pending,
    Active,
    Suspended,
}

impl DeploymentStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Active => "active",
            DeploymentStatus::Suspended => "suspended",
        }
    }

    /// The column carries a CHECK constraint, so anything else means the row predates it
    pub fn from_db_string(s: &str) -> DeploymentStatus {
        match s {
            "active" => DeploymentStatus::Active,
            "suspended" => DeploymentStatus::Suspended,
            _ => DeploymentStatus::Pending,
        }
    }
}

/// Database request for creating a deployment
#[derive(Debug, Clone)]
pub struct DeploymentCreateDBRequest {
    pub business_id: BusinessId,
    pub name: String,
    pub domain: Option<String>,
    pub status: DeploymentStatus,
    pub metadata: serde_json::Value,
}

/// Database request for a partial update.
///
/// `None` leaves a field untouched. `domain` is three-state: `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct DeploymentUpdateDBRequest {
    pub name: Option<String>,
    pub domain: Option<Option<String>>,
    pub status: Option<DeploymentStatus>,
    pub metadata: Option<serde_json::Value>,
}

/// Database response for a deployment
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentDBResponse {
    pub id: i64,
    pub business_id: BusinessId,
    pub name: String,
    pub domain: Option<String>,
    pub status: DeploymentStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
