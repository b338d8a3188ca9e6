//! Database repository for deployments.

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::deployments::{DeploymentCreateDBRequest, DeploymentDBResponse, DeploymentStatus, DeploymentUpdateDBRequest},
    },
    types::BusinessId,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

const DEPLOYMENT_COLUMNS: &str = "id, business_id, name, domain, status, metadata, created_at, updated_at";

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Deployment {
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    pub domain: Option<String>,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Deployment> for DeploymentDBResponse {
    fn from(d: Deployment) -> Self {
        Self {
            id: d.id,
            business_id: d.business_id,
            name: d.name,
            domain: d.domain,
            status: DeploymentStatus::from_db_string(&d.status),
            metadata: d.metadata,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

pub struct Deployments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Deployments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Deployments<'c> {
    type CreateRequest = DeploymentCreateDBRequest;
    type UpdateRequest = DeploymentUpdateDBRequest;
    type Response = DeploymentDBResponse;
    type Id = BusinessId;

    #[instrument(skip(self, request), fields(business_id = request.business_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let sql = format!(
            "INSERT INTO deployments (business_id, name, domain, status, metadata) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {DEPLOYMENT_COLUMNS}"
        );
        let deployment = sqlx::query_as::<_, Deployment>(&sql)
            .bind(request.business_id)
            .bind(&request.name)
            .bind(&request.domain)
            .bind(request.status.to_db_string())
            .bind(&request.metadata)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(deployment.into())
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, business_id: Self::Id) -> Result<Option<Self::Response>> {
        let sql = format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE business_id = $1 LIMIT 1");
        let deployment = sqlx::query_as::<_, Deployment>(&sql)
            .bind(business_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(deployment.map(Into::into))
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let sql = format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments ORDER BY business_id, id");
        let deployments = sqlx::query_as::<_, Deployment>(&sql).fetch_all(&mut *self.db).await?;

        Ok(deployments.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, business_id: Self::Id, request: &Self::UpdateRequest) -> Result<u64> {
        // $3 says whether domain was supplied at all, so that $4 = NULL can clear it
        let result = sqlx::query(
            r#"
            UPDATE deployments SET
                name = COALESCE($2, name),
                domain = CASE WHEN $3 THEN $4 ELSE domain END,
                status = COALESCE($5, status),
                metadata = COALESCE($6, metadata),
                updated_at = NOW()
            WHERE business_id = $1
            "#,
        )
        .bind(business_id)
        .bind(request.name.as_deref())
        .bind(request.domain.is_some())
        .bind(request.domain.clone().flatten())
        .bind(request.status.map(|s| s.to_db_string()))
        .bind(&request.metadata)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, business_id: Self::Id) -> Result<u64> {
        let result = sqlx::query("DELETE FROM deployments WHERE business_id = $1")
            .bind(business_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
