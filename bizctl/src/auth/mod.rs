//! Authentication: provider sign-in, sessions, and the callback forwarder.
//!
//! Sign-in is delegated entirely to external identity providers. The flow is:
//!
//! 1. The browser is sent to `/api/auth/{provider}`, which redirects to the provider with a
//!    random `state` stored in a short-lived cookie.
//! 2. The provider redirects (or, for Apple, form-POSTs) back to
//!    `/api/auth/{provider}/callback`.
//! 3. The code is exchanged, the identity resolved, the user upserted by email, and a signed
//!    session cookie is issued.
//!
//! Requests under `/api/auth/*` reach the [`oauth::OAuthRouter`] through
//! [`forwarder::forward`], which turns the router's outcome into an HTTP response without ever
//! parsing the body itself.
//!
//! # Modules
//!
//! - [`forwarder`]: [`forwarder::CallbackHandler`] trait and outcome-to-status mapping
//! - [`oauth`]: The embedded provider router
//! - [`session`]: JWT session tokens and cookies

pub mod forwarder;
pub mod oauth;
pub mod session;
