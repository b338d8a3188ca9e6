//! Repository implementations for database access.
//!
//! Each repository borrows a single `PgConnection` for its lifetime and runs plain
//! parameterised queries over it. Repositories know nothing about availability; that is the
//! job of the stores in [`crate::db::store`].
//!
//! - [`Deployments`]: Deployment records keyed by business ID
//! - [`Users`]: Accounts and provider sign-ins
//!
//! ```ignore
//! let mut conn = pool.acquire().await?;
//! let mut repo = Deployments::new(&mut conn);
//! let deployment = repo.get_by_id(42).await?;
//! ```

pub mod deployments;
pub mod repository;
pub mod users;

pub use deployments::Deployments;
pub use repository::Repository;
pub use users::Users;
