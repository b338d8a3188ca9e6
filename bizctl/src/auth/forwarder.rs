//! Hands raw `/api/auth/*` requests to an embedded router and maps its outcome to a response.
//!
//! The request reaches the handler exactly as it arrived. Nothing upstream reads the body, since
//! some providers form-POST their callback and the router must see those bytes itself.

use std::panic::AssertUnwindSafe;

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use tracing::{debug, error};

/// How a [`CallbackHandler`] finished with a request
#[derive(Debug)]
pub enum HandlerOutcome {
    /// The handler wrote its own response
    Handled(Response),
    /// The handler passed the request on. `None` means nothing matched; `Some` carries the
    /// error the handler reported.
    Next(Option<anyhow::Error>),
}

/// A router that may or may not handle a request
#[async_trait::async_trait]
pub trait CallbackHandler: Send + Sync {
    async fn handle(&self, request: Request) -> anyhow::Result<HandlerOutcome>;
}

/// Run `handler` and translate whatever it does into a response.
///
/// | outcome                      | status |
/// |------------------------------|--------|
/// | `Handled(response)`          | as set by the handler |
/// | `Next(None)`                 | 404 |
/// | `Next(Some(err))`            | 500 |
/// | `Err(err)` or a panic        | 500 |
pub async fn forward(handler: &dyn CallbackHandler, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(handler.handle(request)).catch_unwind().await {
        Ok(Ok(HandlerOutcome::Handled(response))) => response,
        Ok(Ok(HandlerOutcome::Next(None))) => {
            debug!(%method, %path, "Auth router did not handle request");
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
        Ok(Ok(HandlerOutcome::Next(Some(err)))) => {
            error!(%method, %path, "Auth router reported an error: {:#}", err);
            internal_error()
        }
        Ok(Err(err)) => {
            error!(%method, %path, "Auth router failed: {:#}", err);
            internal_error()
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%method, %path, "Auth router panicked: {}", message);
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};

    enum Behaviour {
        Handle,
        NotFound,
        ReportError,
        Fail,
        Panic,
    }

    struct StubHandler(Behaviour);

    #[async_trait::async_trait]
    impl CallbackHandler for StubHandler {
        async fn handle(&self, request: Request) -> anyhow::Result<HandlerOutcome> {
            match self.0 {
                Behaviour::Handle => {
                    // Echo the raw body to prove it arrives untouched
                    let body = to_bytes(request.into_body(), usize::MAX).await?;
                    Ok(HandlerOutcome::Handled((StatusCode::ACCEPTED, body).into_response()))
                }
                Behaviour::NotFound => Ok(HandlerOutcome::Next(None)),
                Behaviour::ReportError => Ok(HandlerOutcome::Next(Some(anyhow::anyhow!("token exchange failed")))),
                Behaviour::Fail => Err(anyhow::anyhow!("router blew up")),
                Behaviour::Panic => panic!("router panicked"),
            }
        }
    }

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/auth/apple/callback")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn status_of(behaviour: Behaviour) -> StatusCode {
        forward(&StubHandler(behaviour), request("")).await.status()
    }

    #[tokio::test]
    async fn test_handled_response_passes_through() {
        let response = forward(&StubHandler(Behaviour::Handle), request("code=abc&state=xyz")).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"code=abc&state=xyz");
    }

    #[tokio::test]
    async fn test_unhandled_is_not_found() {
        assert_eq!(status_of(Behaviour::NotFound).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reported_error_is_internal() {
        assert_eq!(status_of(Behaviour::ReportError).await, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_failed_invocation_is_internal() {
        assert_eq!(status_of(Behaviour::Fail).await, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_panic_is_internal() {
        assert_eq!(status_of(Behaviour::Panic).await, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
