//! HTTP request handlers.
//!
//! - [`auth`]: Username recovery and the `/api/auth/*` catch-all that feeds the OAuth router

pub mod auth;
