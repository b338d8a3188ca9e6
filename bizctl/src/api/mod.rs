//! REST surface: request handlers and their wire models.
//!
//! - **Account recovery** (`POST /api/auth/forgot-username`)
//! - **Sign-in** (`/api/auth/*`): forwarded to the embedded OAuth router
//!
//! The deployment procedures live in [`crate::rpc`]; they share the wire models in
//! [`models::deployments`].
//!
//! Documented endpoints are annotated with `utoipa` and served at `/api/docs`.

pub mod handlers;
pub mod models;
