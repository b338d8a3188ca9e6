use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::errors::Error;

/// tRPC error codes used by this server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcCode {
    ParseError,
    BadRequest,
    Unauthorized,
    NotFound,
    MethodNotSupported,
    Conflict,
    InternalServerError,
}

impl RpcCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcCode::ParseError => "PARSE_ERROR",
            RpcCode::BadRequest => "BAD_REQUEST",
            RpcCode::Unauthorized => "UNAUTHORIZED",
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::MethodNotSupported => "METHOD_NOT_SUPPORTED",
            RpcCode::Conflict => "CONFLICT",
            RpcCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    /// JSON-RPC 2.0 code carried in `error.code`
    pub fn json_rpc_code(&self) -> i32 {
        match self {
            RpcCode::ParseError => -32700,
            RpcCode::BadRequest => -32600,
            RpcCode::InternalServerError => -32603,
            RpcCode::Unauthorized => -32001,
            RpcCode::NotFound => -32004,
            RpcCode::MethodNotSupported => -32005,
            RpcCode::Conflict => -32009,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            RpcCode::ParseError | RpcCode::BadRequest => StatusCode::BAD_REQUEST,
            RpcCode::Unauthorized => StatusCode::UNAUTHORIZED,
            RpcCode::NotFound => StatusCode::NOT_FOUND,
            RpcCode::MethodNotSupported => StatusCode::METHOD_NOT_ALLOWED,
            RpcCode::Conflict => StatusCode::CONFLICT,
            RpcCode::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcError {
    pub code: RpcCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Render the tRPC error envelope for a call to `path`
    pub fn into_response_for(self, path: &str) -> Response {
        let status = self.code.http_status();
        let body = json!({
            "error": {
                "message": self.message,
                "code": self.code.json_rpc_code(),
                "data": {
                    "code": self.code.as_str(),
                    "httpStatus": status.as_u16(),
                    "path": path,
                }
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Application errors keep their user-safe message; the status picks the tRPC code
impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        let code = match err.status_code() {
            StatusCode::BAD_REQUEST => RpcCode::BadRequest,
            StatusCode::UNAUTHORIZED => RpcCode::Unauthorized,
            StatusCode::NOT_FOUND => RpcCode::NotFound,
            StatusCode::CONFLICT => RpcCode::Conflict,
            _ => RpcCode::InternalServerError,
        };

        match code {
            RpcCode::InternalServerError => error!("Procedure failed: {:#}", err),
            RpcCode::Conflict => warn!("Procedure conflict: {}", err),
            _ => debug!("Procedure rejected: {}", err),
        }

        Self::new(code, err.user_message())
    }
}
