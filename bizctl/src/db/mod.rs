//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, RPC procedures)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Stores    │  (db::store - availability semantics)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries over one connection)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Availability
//!
//! Connections are obtained per operation through [`Database::connection`], which yields `None`
//! instead of failing when no database is configured or the pool cannot hand out a connection.
//! Each caller decides what "unavailable" means for it: reads answer absent/empty, writes fail
//! with [`errors::DbError::StoreUnavailable`].
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/` directory.
//! The [`crate::migrator`] function provides access to the migrator.

pub mod errors;
pub mod handlers;
pub mod models;
pub mod store;

use std::time::Duration;

use sqlx::{
    PgPool, Postgres,
    pool::PoolConnection,
    postgres::PgPoolOptions,
};
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

/// Accessor for the main connection pool. May be unavailable.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Option<PgPool>,
}

impl Database {
    /// Build a lazily-connecting pool from configuration. Without a URL the accessor is
    /// unavailable; a malformed URL is a configuration error.
    pub fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let Some(url) = config.url.as_deref() else {
            warn!("No database URL configured; the deployment store is unavailable");
            return Ok(Self::unavailable());
        };

        let settings = &config.pool;
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .idle_timeout((settings.idle_timeout_secs > 0).then(|| Duration::from_secs(settings.idle_timeout_secs)))
            .max_lifetime((settings.max_lifetime_secs > 0).then(|| Duration::from_secs(settings.max_lifetime_secs)))
            .connect_lazy(url)?;

        debug!("Database pool created (max_connections: {})", settings.max_connections);
        Ok(Self { pool: Some(pool) })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    /// An accessor that never yields a connection
    pub fn unavailable() -> Self {
        Self { pool: None }
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    /// Obtain a pooled connection, or `None` if the store is unavailable
    pub async fn connection(&self) -> Option<PoolConnection<Postgres>> {
        let pool = self.pool.as_ref()?;
        match pool.acquire().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("Failed to acquire database connection: {}", e);
                None
            }
        }
    }

    /// Round-trip check used by the health procedure
    pub async fn ping(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        sqlx::query("SELECT 1").execute(&mut *conn).await.is_ok()
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
