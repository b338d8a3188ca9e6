//! Wire models for deployment procedures. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;

use crate::{
    db::models::deployments::{DeploymentCreateDBRequest, DeploymentDBResponse, DeploymentStatus, DeploymentUpdateDBRequest},
    types::BusinessId,
};

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentCreate {
    pub business_id: BusinessId,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub status: DeploymentStatus,
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,
}

impl From<DeploymentCreate> for DeploymentCreateDBRequest {
    fn from(api: DeploymentCreate) -> Self {
        Self {
            business_id: api.business_id,
            name: api.name,
            domain: api.domain,
            status: api.status,
            metadata: api.metadata,
        }
    }
}

/// Partial update. Omitted fields are left alone; `domain: null` clears the domain.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentUpdate {
    pub business_id: BusinessId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub domain: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<DeploymentStatus>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl DeploymentUpdate {
    pub fn into_parts(self) -> (BusinessId, DeploymentUpdateDBRequest) {
        (
            self.business_id,
            DeploymentUpdateDBRequest {
                name: self.name,
                domain: self.domain,
                status: self.status,
                metadata: self.metadata,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BusinessIdInput {
    pub business_id: BusinessId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResponse {
    pub id: i64,
    pub business_id: BusinessId,
    pub name: String,
    pub domain: Option<String>,
    pub status: DeploymentStatus,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeploymentDBResponse> for DeploymentResponse {
    fn from(db: DeploymentDBResponse) -> Self {
        Self {
            id: db.id,
            business_id: db.business_id,
            name: db.name,
            domain: db.domain,
            status: db.status,
            metadata: db.metadata,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowsAffected {
    pub rows_affected: u64,
}
