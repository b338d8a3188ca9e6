//! Availability-aware access to deployment records.
//!
//! [`DeploymentStore`] is what the rest of the application talks to. It takes a fresh
//! connection from [`Database`] for every call and degrades when none is available: reads come
//! back absent or empty, writes fail with [`DbError::StoreUnavailable`].

use tracing::{debug, instrument, warn};

use crate::{
    db::{
        Database,
        errors::{DbError, Result},
        handlers::{Deployments, Repository},
        models::deployments::{DeploymentCreateDBRequest, DeploymentDBResponse, DeploymentUpdateDBRequest},
    },
    types::BusinessId,
};

#[derive(Clone, Debug)]
pub struct DeploymentStore {
    db: Database,
}

impl DeploymentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new deployment. Never overwrites: a second record for the same business is a
    /// unique violation.
    #[instrument(skip(self, request), fields(business_id = request.business_id), err)]
    pub async fn create(&self, request: &DeploymentCreateDBRequest) -> Result<DeploymentDBResponse> {
        let mut conn = self.db.connection().await.ok_or(DbError::StoreUnavailable)?;
        Deployments::new(&mut conn).create(request).await
    }

    /// The deployment for a business, or `None` when there is none or the store is unavailable
    #[instrument(skip(self), err)]
    pub async fn get_by_business_id(&self, business_id: BusinessId) -> Result<Option<DeploymentDBResponse>> {
        let Some(mut conn) = self.db.connection().await else {
            debug!("Deployment store unavailable; treating lookup as absent");
            return Ok(None);
        };
        Deployments::new(&mut conn).get_by_id(business_id).await
    }

    /// Apply a partial update, returning the number of rows changed (0 if none matched)
    #[instrument(skip(self, request), err)]
    pub async fn update(&self, business_id: BusinessId, request: &DeploymentUpdateDBRequest) -> Result<u64> {
        let mut conn = self.db.connection().await.ok_or(DbError::StoreUnavailable)?;
        Deployments::new(&mut conn).update(business_id, request).await
    }

    /// Remove a business's deployment, returning the number of rows removed
    #[instrument(skip(self), err)]
    pub async fn delete(&self, business_id: BusinessId) -> Result<u64> {
        let mut conn = self.db.connection().await.ok_or(DbError::StoreUnavailable)?;
        Deployments::new(&mut conn).delete(business_id).await
    }

    /// Every deployment, or an empty list when the store is unavailable
    #[instrument(skip(self), err)]
    pub async fn list_all(&self) -> Result<Vec<DeploymentDBResponse>> {
        let Some(mut conn) = self.db.connection().await else {
            warn!("Deployment store unavailable; listing no deployments");
            return Ok(Vec::new());
        };
        Deployments::new(&mut conn).list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::deployments::DeploymentStatus;
    use serde_json::json;
    use sqlx::PgPool;

    fn acme() -> DeploymentCreateDBRequest {
        DeploymentCreateDBRequest {
            business_id: 42,
            name: "Acme".to_string(),
            domain: Some("acme.example.com".to_string()),
            status: DeploymentStatus::Pending,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_unavailable_store_reads_are_empty() {
        let store = DeploymentStore::new(Database::unavailable());
        assert!(store.get_by_business_id(42).await.unwrap().is_none());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_writes_fail() {
        let store = DeploymentStore::new(Database::unavailable());

        assert!(matches!(store.create(&acme()).await, Err(DbError::StoreUnavailable)));
        assert!(matches!(
            store.update(42, &DeploymentUpdateDBRequest::default()).await,
            Err(DbError::StoreUnavailable)
        ));
        assert!(matches!(store.delete(42).await, Err(DbError::StoreUnavailable)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_store_lifecycle(pool: PgPool) {
        let store = DeploymentStore::new(Database::from_pool(pool));

        let created = store.create(&acme()).await.unwrap();
        assert_eq!(created.business_id, 42);
        assert_eq!(store.get_by_business_id(42).await.unwrap(), Some(created.clone()));

        let update = DeploymentUpdateDBRequest {
            name: Some("Acme Corp".to_string()),
            ..Default::default()
        };
        assert_eq!(store.update(42, &update).await.unwrap(), 1);
        assert_eq!(store.get_by_business_id(42).await.unwrap().unwrap().name, "Acme Corp");

        assert_eq!(store.list_all().await.unwrap().len(), 1);

        assert_eq!(store.delete(42).await.unwrap(), 1);
        assert!(store.get_by_business_id(42).await.unwrap().is_none());
        assert_eq!(store.delete(42).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_store_empty_update_touches_row(pool: PgPool) {
        let store = DeploymentStore::new(Database::from_pool(pool));
        let empty = DeploymentUpdateDBRequest::default();

        assert_eq!(store.update(42, &empty).await.unwrap(), 0);
        let created = store.create(&acme()).await.unwrap();
        assert_eq!(store.update(42, &empty).await.unwrap(), 1);

        let touched = store.get_by_business_id(42).await.unwrap().unwrap();
        assert_eq!(touched.name, created.name);
        assert!(touched.updated_at >= created.updated_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_store_create_is_additive(pool: PgPool) {
        let store = DeploymentStore::new(Database::from_pool(pool));
        store.create(&acme()).await.unwrap();

        let err = store.create(&acme()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
