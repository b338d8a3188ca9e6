use axum::{
    Json,
    body::Bytes,
    extract::{Request, State},
    response::Response,
};
use tracing::{Instrument, debug, error, info};

use crate::{
    AppState,
    api::models::auth::{ForgotUsernameRequest, ForgotUsernameResponse},
    auth::forwarder::forward,
    db::{errors::DbError, handlers::Users},
    errors::Error,
    types::mask_email,
};

/// Recover a forgotten username by email
///
/// Always answers with the same message once the lookup has run, so the response never reveals
/// whether an account exists.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-username",
    request_body = ForgotUsernameRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Request accepted", body = ForgotUsernameResponse),
        (status = 400, description = "Email missing", body = crate::errors::ErrorBody),
        (status = 500, description = "Unexpected failure", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forgot_username(State(state): State<AppState>, body: Bytes) -> Result<Json<ForgotUsernameResponse>, Error> {
    // Read the body by hand: anything that isn't a JSON object with an email is the same client error
    let email = serde_json::from_slice::<ForgotUsernameRequest>(&body)
        .ok()
        .and_then(|request| request.email)
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .ok_or(Error::MissingField { field: "email" })?;

    let mut conn = state.db.connection().await.ok_or(DbError::StoreUnavailable)?;
    let user = Users::new(&mut conn).get_user_by_email(&email).await?;
    drop(conn);

    match user {
        Some(user) => match user.username {
            Some(username) => {
                // Delivery runs off the request so response timing matches the other outcomes
                let email_service = state.email.clone();
                tokio::spawn(
                    async move {
                        match email_service
                            .send_username_recovery_email(&user.email, user.display_name.as_deref(), &username)
                            .await
                        {
                            Ok(()) => info!(email = %mask_email(&user.email), "Username recovery email sent"),
                            Err(e) => error!(email = %mask_email(&user.email), "Failed to deliver username recovery email: {:#}", e),
                        }
                    }
                    .in_current_span(),
                );
            }
            None => debug!(email = %mask_email(&email), "Account has no username; nothing to send"),
        },
        None => debug!(email = %mask_email(&email), "No account for username recovery"),
    }

    Ok(Json(ForgotUsernameResponse::generic()))
}

/// Everything else under `/api/auth/`, handed to the OAuth router with the body untouched
#[tracing::instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn auth_router(State(state): State<AppState>, request: Request) -> Response {
    forward(state.oauth.as_ref(), request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::auth::FORGOT_USERNAME_MESSAGE,
        config::{Config, EmailTransportConfig},
        db::{Database, models::users::UserCreateDBRequest},
        errors::{ErrorBody, GENERIC_FAILURE_MESSAGE},
        test_utils::{create_test_config, wait_for_sent_emails},
    };
    use axum::{http::StatusCode, routing::post};
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::PgPool;

    fn server(config: Config, db: Database) -> TestServer {
        let state = AppState::new(config, db).unwrap();
        let app = axum::Router::new()
            .route("/api/auth/forgot-username", post(forgot_username))
            .with_state(state);
        TestServer::new(app).unwrap()
    }

    async fn create_user(pool: &PgPool, email: &str, username: Option<&str>) {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: email.to_string(),
                username: username.map(str::to_string),
                display_name: Some("Jane".to_string()),
                auth_source: "google".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_email_is_bad_request_without_lookup() {
        let dir = tempfile::tempdir().unwrap();
        // The store is unavailable, so any lookup would answer 500 instead
        let server = server(create_test_config(dir.path()), Database::unavailable());

        for body in [json!({}), json!({"email": null}), json!({"email": "   "}), json!({"mail": "a@b.c"})] {
            let response = server.post("/api/auth/forgot-username").json(&body).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            let error: ErrorBody = response.json();
            assert_eq!(error.error, "Email is required");
        }

        let response = server.post("/api/auth/forgot-username").text("email=a@b.c").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_unavailable_is_generic_failure() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(create_test_config(dir.path()), Database::unavailable());

        let response = server
            .post("/api/auth/forgot-username")
            .json(&json!({"email": "jane@example.com"}))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorBody = response.json();
        assert_eq!(error.error, GENERIC_FAILURE_MESSAGE);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_response_is_identical_across_outcomes(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        create_user(&pool, "named@example.com", Some("jane_doe")).await;
        create_user(&pool, "anonymous@example.com", None).await;
        let server = server(create_test_config(dir.path()), Database::from_pool(pool));

        let mut bodies = Vec::new();
        for email in ["nobody@example.com", "anonymous@example.com", "Named@Example.com"] {
            let response = server.post("/api/auth/forgot-username").json(&json!({ "email": email })).await;
            response.assert_status_ok();
            bodies.push(response.text());
        }

        assert!(bodies.iter().all(|b| b == &bodies[0]));
        let body: ForgotUsernameResponse = serde_json::from_str(&bodies[0]).unwrap();
        assert_eq!(body.message, FORGOT_USERNAME_MESSAGE);

        // Only the account with a username gets mail
        let sent = wait_for_sent_emails(dir.path(), 1).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("named@example.com"));
        assert!(sent[0].contains("jane_doe"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delivery_failure_is_not_surfaced(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        create_user(&pool, "jane@example.com", Some("jane_doe")).await;

        let mut config = create_test_config(dir.path());
        // Nothing listens on port 1
        config.email.transport = EmailTransportConfig::Smtp {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: None,
            password: None,
            use_tls: false,
        };
        let server = server(config, Database::from_pool(pool));

        let response = server
            .post("/api/auth/forgot-username")
            .json(&json!({"email": "jane@example.com"}))
            .await;
        response.assert_status_ok();
        let body: ForgotUsernameResponse = response.json();
        assert_eq!(body, ForgotUsernameResponse::generic());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_slow_delivery_does_not_delay_response(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        create_user(&pool, "jane@example.com", Some("jane_doe")).await;

        // Accepts connections but never sends an SMTP greeting
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = create_test_config(dir.path());
        config.email.transport = EmailTransportConfig::Smtp {
            host: "127.0.0.1".to_string(),
            port,
            username: None,
            password: None,
            use_tls: false,
        };
        let server = server(config, Database::from_pool(pool));

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            server.post("/api/auth/forgot-username").json(&json!({"email": "jane@example.com"})),
        )
        .await
        .expect("response waited on mail delivery");
        response.assert_status_ok();
    }
}
