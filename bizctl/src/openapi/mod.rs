//! OpenAPI document served at `/api-docs/openapi.json` and rendered by Scalar at `/api/docs`.
//!
//! The OAuth and RPC surfaces are dispatched dynamically, so they are described here through
//! documentation-only stubs.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{api, auth::session::SessionClaims, db::models::deployments::DeploymentStatus, errors::ErrorBody};

/// Session cookie issued after an OAuth sign-in
struct SessionCookieAddon;

impl Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "SessionCookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "bizctl_session",
                    "Signed session token set by the OAuth callback. The cookie name is configurable.",
                ))),
            );
        }
    }
}

/// Begin an OAuth sign-in
#[utoipa::path(
    get,
    path = "/api/auth/{provider}",
    tag = "authentication",
    params(("provider" = String, Path, description = "google, microsoft or apple")),
    responses(
        (status = 302, description = "Redirect to the provider's consent page, with a state cookie set"),
        (status = 404, description = "Unknown or unconfigured provider"),
    )
)]
#[allow(unused)]
fn oauth_start() {}

/// Provider redirect target. Apple posts the result as a form instead.
#[utoipa::path(
    get,
    path = "/api/auth/{provider}/callback",
    tag = "authentication",
    params(
        ("provider" = String, Path, description = "google, microsoft or apple"),
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "Must match the state cookie"),
        ("error" = Option<String>, Query, description = "Set by the provider when consent failed"),
    ),
    responses(
        (status = 302, description = "Signed in; session cookie set and redirected to the dashboard"),
        (status = 400, description = "State mismatch or no email from the provider", body = ErrorBody),
        (status = 500, description = "Provider exchange failed"),
    )
)]
#[allow(unused)]
fn oauth_callback() {}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/api/auth/signout",
    tag = "authentication",
    responses((status = 302, description = "Session cleared; redirected to the dashboard")),
    security(("SessionCookie" = []))
)]
#[allow(unused)]
fn signout() {}

/// Call a procedure. Queries (`health`, `session.get`, `deployment.list`,
/// `deployment.byBusinessId`) take GET with the input in `?input=`; mutations
/// (`deployment.create`, `deployment.update`, `deployment.delete`) take POST with a JSON body.
#[utoipa::path(
    post,
    path = "/api/trpc/{procedure}",
    tag = "rpc",
    params(("procedure" = String, Path, description = "Procedure name, e.g. deployment.create")),
    request_body(content = Object, description = "Procedure input", content_type = "application/json"),
    responses(
        (status = 200, description = "`{\"result\":{\"data\":...}}`"),
        (status = 400, description = "Malformed input or batched call"),
        (status = 401, description = "Procedure requires a session"),
        (status = 404, description = "Unknown procedure"),
        (status = 405, description = "Wrong HTTP method for the procedure kind"),
        (status = 409, description = "A deployment already exists for the business"),
    ),
    security((), ("SessionCookie" = []))
)]
#[allow(unused)]
fn rpc_call() {}

#[derive(OpenApi)]
#[openapi(
    info(title = "bizctl", description = "Deployment store, OAuth sign-in and account recovery"),
    modifiers(&SessionCookieAddon),
    paths(
        api::handlers::auth::forgot_username,
        oauth_start,
        oauth_callback,
        signout,
        rpc_call,
    ),
    components(schemas(
        api::models::auth::ForgotUsernameRequest,
        api::models::auth::ForgotUsernameResponse,
        api::models::deployments::DeploymentCreate,
        api::models::deployments::DeploymentUpdate,
        api::models::deployments::BusinessIdInput,
        api::models::deployments::DeploymentResponse,
        api::models::deployments::RowsAffected,
        DeploymentStatus,
        SessionClaims,
        ErrorBody,
    )),
    tags(
        (name = "authentication", description = "OAuth sign-in and account recovery"),
        (name = "rpc", description = "Session and deployment procedures"),
    )
)]
pub struct ApiDoc;
