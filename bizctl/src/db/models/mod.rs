//! Database record models matching table schemas.
//!
//! These structs are what the repositories in [`crate::db::handlers`] accept and return. They
//! are kept separate from the API models in [`crate::api::models`] so the storage shape and the
//! wire shape can evolve independently; conversions live next to the API types.
//!
//! - [`deployments`]: One deployment record per business
//! - [`users`]: Accounts created by the embedded sign-in flow

pub mod deployments;
pub mod users;
