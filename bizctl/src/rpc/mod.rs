//! tRPC-compatible procedure dispatch at `/api/trpc/{procedure}`.
//!
//! Queries are `GET` with the input as URL-encoded JSON in `?input=`; mutations are `POST` with
//! a JSON body. Responses use the tRPC envelopes:
//!
//! ```text
//! 200 {"result": {"data": ...}}
//! 4xx/5xx {"error": {"message", "code", "data": {"code", "httpStatus", "path"}}}
//! ```
//!
//! Batched calls are not supported.

mod error;
mod procedures;

pub use error::{RpcCode, RpcError};
pub use procedures::{Procedure, ProcedureKind};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::{AppState, auth::session::{SessionClaims, session_from_headers}, config::Config, errors::Error};

/// Per-call context, built from the request headers
#[derive(Debug, Clone, Default)]
pub struct RpcContext {
    pub session: Option<SessionClaims>,
}

impl RpcContext {
    pub fn from_headers(headers: &HeaderMap, config: &Config) -> Self {
        Self {
            session: session_from_headers(headers, config),
        }
    }

    /// The signed-in session, for protected procedures
    pub fn require_session(&self) -> Result<&SessionClaims, Error> {
        self.session.as_ref().ok_or(Error::Unauthenticated { message: None })
    }
}

#[derive(Debug, Default, Deserialize)]
struct QueryParams {
    input: Option<String>,
    batch: Option<String>,
}

#[instrument(skip_all, fields(procedure = %procedure, method = %method))]
pub async fn rpc_handler(
    State(state): State<AppState>,
    Path(procedure): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match dispatch(&state, &procedure, &method, query.as_deref(), &headers, &body).await {
        Ok(data) => (StatusCode::OK, Json(json!({ "result": { "data": data } }))).into_response(),
        Err(err) => err.into_response_for(&procedure),
    }
}

async fn dispatch(
    state: &AppState,
    path: &str,
    method: &Method,
    query: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Value, RpcError> {
    let params: QueryParams = serde_urlencoded::from_str(query.unwrap_or_default())
        .map_err(|e| RpcError::new(RpcCode::BadRequest, format!("Invalid query string: {e}")))?;
    if params.batch.is_some() {
        return Err(RpcError::new(RpcCode::BadRequest, "Batch calls are not supported"));
    }

    let procedure = Procedure::from_path(path)
        .ok_or_else(|| RpcError::new(RpcCode::NotFound, format!("No procedure found on path \"{path}\"")))?;

    let expected = match procedure.kind() {
        ProcedureKind::Query => Method::GET,
        ProcedureKind::Mutation => Method::POST,
    };
    if *method != expected {
        return Err(RpcError::new(
            RpcCode::MethodNotSupported,
            format!("Unsupported {} request to {} procedure at path \"{path}\"", method, procedure.kind()),
        ));
    }

    let input = match procedure.kind() {
        ProcedureKind::Query => match params.input.as_deref() {
            Some(raw) => serde_json::from_str(raw),
            None => Ok(Value::Null),
        },
        ProcedureKind::Mutation if body.is_empty() => Ok(Value::Null),
        ProcedureKind::Mutation => serde_json::from_slice(body),
    }
    .map_err(|e| RpcError::new(RpcCode::ParseError, format!("Input is not valid JSON: {e}")))?;

    let ctx = RpcContext::from_headers(headers, &state.config);
    debug!(signed_in = ctx.session.is_some(), "Dispatching procedure");

    procedure.call(state, &ctx, input).await.map_err(RpcError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::session::create_session_token,
        db::Database,
        test_utils::{create_test_config, create_test_session},
    };
    use axum::routing::get;
    use axum_test::TestServer;
    use sqlx::PgPool;

    struct Harness {
        server: TestServer,
        cookie: String,
    }

    fn harness(db: Database) -> Harness {
        let dir = std::env::temp_dir();
        let config = create_test_config(&dir);
        let claims = create_test_session(&config);
        let token = create_session_token(&claims, &config).unwrap();
        let cookie = format!("{}={token}", config.session.cookie_name);

        let state = AppState::new(config, db).unwrap();
        let app = axum::Router::new()
            .route("/api/trpc/{procedure}", get(rpc_handler).post(rpc_handler))
            .with_state(state);
        Harness {
            server: TestServer::new(app).unwrap(),
            cookie,
        }
    }

    fn query_path(procedure: &str, input: &Value) -> String {
        let encoded = serde_urlencoded::to_string([("input", input.to_string())]).unwrap();
        format!("/api/trpc/{procedure}?{encoded}")
    }

    #[tokio::test]
    async fn test_health_envelope() {
        let h = harness(Database::unavailable());

        let response = h.server.get("/api/trpc/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({"result": {"data": {"status": "ok", "database": false}}}));
    }

    #[tokio::test]
    async fn test_unknown_procedure_is_not_found() {
        let h = harness(Database::unavailable());

        let response = h.server.get("/api/trpc/deployment.explode").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], -32004);
        assert_eq!(body["error"]["data"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["data"]["httpStatus"], 404);
        assert_eq!(body["error"]["data"]["path"], "deployment.explode");
    }

    #[tokio::test]
    async fn test_wrong_method_is_method_not_supported() {
        let h = harness(Database::unavailable());

        let response = h.server.post("/api/trpc/health").await;
        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = response.json();
        assert_eq!(body["error"]["data"]["code"], "METHOD_NOT_SUPPORTED");

        let response = h.server.get("/api/trpc/deployment.create").await;
        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_protected_procedure_requires_session() {
        let h = harness(Database::unavailable());

        let response = h.server.get("/api/trpc/deployment.list").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["error"]["data"]["code"], "UNAUTHORIZED");

        let response = h
            .server
            .get("/api/trpc/deployment.list")
            .add_header("cookie", "bizctl_session=forged")
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_get() {
        let h = harness(Database::unavailable());

        let anonymous: Value = h.server.get("/api/trpc/session.get").await.json();
        assert_eq!(anonymous["result"]["data"], Value::Null);

        let signed_in: Value = h.server.get("/api/trpc/session.get").add_header("cookie", &h.cookie).await.json();
        assert_eq!(signed_in["result"]["data"]["email"], "session@example.com");
    }

    #[tokio::test]
    async fn test_batch_and_bad_input_are_bad_request() {
        let h = harness(Database::unavailable());

        let response = h.server.get("/api/trpc/health?batch=1").await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = h
            .server
            .get("/api/trpc/deployment.byBusinessId?input=%7Bnot-json")
            .add_header("cookie", &h.cookie)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["data"]["code"], "PARSE_ERROR");

        let response = h
            .server
            .get(&query_path("deployment.byBusinessId", &json!({"business": 1})))
            .add_header("cookie", &h.cookie)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["data"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let h = harness(Database::unavailable());

        // Reads degrade to empty results
        let list: Value = h.server.get("/api/trpc/deployment.list").add_header("cookie", &h.cookie).await.json();
        assert_eq!(list["result"]["data"], json!([]));

        let one: Value = h
            .server
            .get(&query_path("deployment.byBusinessId", &json!({"businessId": 42})))
            .add_header("cookie", &h.cookie)
            .await
            .json();
        assert_eq!(one["result"]["data"], Value::Null);

        // Writes fail without leaking detail
        let response = h
            .server
            .post("/api/trpc/deployment.create")
            .add_header("cookie", &h.cookie)
            .json(&json!({"businessId": 42, "name": "Acme"}))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"]["data"]["code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(body["error"]["message"], crate::errors::GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn test_non_object_metadata_is_bad_request() {
        let h = harness(Database::unavailable());

        for (procedure, input) in [
            ("deployment.create", json!({"businessId": 42, "name": "Acme", "metadata": [1, 2]})),
            ("deployment.update", json!({"businessId": 42, "metadata": "plan=pro"})),
        ] {
            let response = h
                .server
                .post(&format!("/api/trpc/{procedure}"))
                .add_header("cookie", &h.cookie)
                .json(&input)
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            let body: Value = response.json();
            assert_eq!(body["error"]["data"]["code"], "BAD_REQUEST");
            assert_eq!(body["error"]["data"]["path"], procedure);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deployment_round_trip(pool: PgPool) {
        let h = harness(Database::from_pool(pool));

        let created: Value = h
            .server
            .post("/api/trpc/deployment.create")
            .add_header("cookie", &h.cookie)
            .json(&json!({"businessId": 42, "name": "Acme", "domain": "acme.example.com"}))
            .await
            .json();
        assert_eq!(created["result"]["data"]["businessId"], 42);
        assert_eq!(created["result"]["data"]["status"], "pending");

        let duplicate = h
            .server
            .post("/api/trpc/deployment.create")
            .add_header("cookie", &h.cookie)
            .json(&json!({"businessId": 42, "name": "Acme again"}))
            .await;
        duplicate.assert_status(StatusCode::CONFLICT);
        let body: Value = duplicate.json();
        assert_eq!(body["error"]["data"]["code"], "CONFLICT");

        let fetched: Value = h
            .server
            .get(&query_path("deployment.byBusinessId", &json!({"businessId": 42})))
            .add_header("cookie", &h.cookie)
            .await
            .json();
        assert_eq!(fetched["result"]["data"]["name"], "Acme");

        let updated: Value = h
            .server
            .post("/api/trpc/deployment.update")
            .add_header("cookie", &h.cookie)
            .json(&json!({"businessId": 42, "status": "active", "domain": null}))
            .await
            .json();
        assert_eq!(updated["result"]["data"], json!({"rowsAffected": 1}));

        let fetched: Value = h
            .server
            .get(&query_path("deployment.byBusinessId", &json!({"businessId": 42})))
            .add_header("cookie", &h.cookie)
            .await
            .json();
        assert_eq!(fetched["result"]["data"]["status"], "active");
        assert_eq!(fetched["result"]["data"]["domain"], Value::Null);

        let deleted: Value = h
            .server
            .post("/api/trpc/deployment.delete")
            .add_header("cookie", &h.cookie)
            .json(&json!({"businessId": 42}))
            .await
            .json();
        assert_eq!(deleted["result"]["data"], json!({"rowsAffected": 1}));

        let deleted_again: Value = h
            .server
            .post("/api/trpc/deployment.delete")
            .add_header("cookie", &h.cookie)
            .json(&json!({"businessId": 42}))
            .await
            .json();
        assert_eq!(deleted_again["result"]["data"], json!({"rowsAffected": 0}));

        let list: Value = h.server.get("/api/trpc/deployment.list").add_header("cookie", &h.cookie).await.json();
        assert_eq!(list["result"]["data"], json!([]));
    }
}
