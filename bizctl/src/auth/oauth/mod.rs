//! Embedded sign-in router for Google, Microsoft and Apple.
//!
//! Routes (all relative to `/api/auth/`):
//!
//! - `GET {provider}`: redirect to the provider with a fresh `state`
//! - `GET|POST {provider}/callback`: finish sign-in, issue the session cookie
//! - `POST signout`: drop the session cookie
//!
//! Anything else, including providers without credentials, is passed on as
//! [`HandlerOutcome::Next`] so the forwarder answers 404.

pub mod provider;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::{Body, to_bytes},
    extract::Request,
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    auth::{
        forwarder::{CallbackHandler, HandlerOutcome},
        session::{SessionClaims, clear_session_cookie, create_session_token, read_cookie, session_cookie},
    },
    config::Config,
    db::{
        Database,
        errors::DbError,
        handlers::Users,
        models::users::OAuthUserUpsert,
    },
    errors::Error,
    types::mask_email,
};

pub use provider::{Provider, ProviderEndpoints};

/// Cookie carrying the `state` of an in-flight sign-in
pub const STATE_COOKIE: &str = "bizctl_oauth_state";

/// Form-posted callbacks are a handful of short fields
const CALLBACK_BODY_LIMIT: usize = 64 * 1024;

const INVALID_CALLBACK: &str = "Invalid OAuth callback";

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    /// Apple sends the user's name as JSON, once, on first sign-in
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    id_token: Option<String>,
}

/// The parts of an OpenID identity we keep
#[derive(Debug, Default, Deserialize)]
struct Identity {
    email: Option<String>,
    name: Option<String>,
    /// Apple sends this as a string, the others as a bool
    email_verified: Option<serde_json::Value>,
}

impl Identity {
    /// True only when the provider explicitly says the email is unverified
    fn email_unverified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(verified)) => !verified,
            Some(serde_json::Value::String(verified)) => verified.eq_ignore_ascii_case("false"),
            _ => false,
        }
    }
}

/// Result of a completed code exchange
enum SignIn {
    Session(String),
    Rejected(&'static str),
}

#[derive(Debug, Deserialize)]
struct AppleUser {
    name: Option<AppleName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppleName {
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Clone)]
pub struct OAuthRouter {
    config: Arc<Config>,
    db: Database,
    http: reqwest::Client,
}

impl OAuthRouter {
    pub fn new(config: Arc<Config>, db: Database) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self { config, db, http })
    }

    fn enabled_provider(&self, segment: &str) -> Option<Provider> {
        Provider::from_path_segment(segment).filter(|p| p.config(&self.config.oauth).is_enabled())
    }

    fn redirect_uri(&self, provider: Provider) -> String {
        format!("{}/api/auth/{}/callback", self.config.public_url.trim_end_matches('/'), provider)
    }

    /// Send the browser to the provider's consent screen
    #[instrument(skip(self))]
    fn start(&self, provider: Provider) -> anyhow::Result<Response> {
        let config = provider.config(&self.config.oauth);
        let endpoints = provider.endpoints(config)?;
        let state = Uuid::new_v4().simple().to_string();

        let mut location = endpoints.authorize;
        {
            let mut query = location.query_pairs_mut();
            query
                .append_pair("client_id", config.client_id.as_deref().unwrap_or_default())
                .append_pair("redirect_uri", &self.redirect_uri(provider))
                .append_pair("response_type", "code")
                .append_pair("scope", &provider.scope(config))
                .append_pair("state", &state);
            if provider.uses_form_post() {
                query.append_pair("response_mode", "form_post");
            }
        }

        Ok(Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, location.as_str())
            .header(header::SET_COOKIE, self.state_cookie(provider, &state))
            .body(Body::empty())?)
    }

    fn state_cookie(&self, provider: Provider, value: &str) -> String {
        let max_age = if value.is_empty() { 0 } else { self.config.oauth.state_ttl.as_secs() };
        let mut cookie = format!("{STATE_COOKIE}={value}; Path=/api/auth; HttpOnly; Max-Age={max_age}");
        if provider.uses_form_post() {
            // The form POST back from Apple is cross-site
            cookie.push_str("; SameSite=None; Secure");
        } else {
            cookie.push_str("; SameSite=Lax");
            if self.config.session.cookie_secure {
                cookie.push_str("; Secure");
            }
        }
        cookie
    }

    fn dashboard_redirect(&self, cookies: &[String]) -> anyhow::Result<Response> {
        let mut builder = Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, self.config.dashboard_url.as_str());
        for cookie in cookies {
            builder = builder.header(header::SET_COOKIE, cookie);
        }
        Ok(builder.body(Body::empty())?)
    }

    fn login_error_redirect(&self, error: &str) -> anyhow::Result<Response> {
        let mut location = Url::parse(&format!("{}/login", self.config.dashboard_url.trim_end_matches('/')))?;
        location.query_pairs_mut().append_pair("error", error);

        Ok(Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, location.as_str())
            .body(Body::empty())?)
    }

    #[instrument(skip(self, request))]
    async fn callback(&self, provider: Provider, request: Request) -> anyhow::Result<HandlerOutcome> {
        let (parts, body) = request.into_parts();

        let params = if parts.method == Method::POST {
            match to_bytes(body, CALLBACK_BODY_LIMIT).await {
                Ok(bytes) => serde_urlencoded::from_bytes::<CallbackParams>(&bytes).ok(),
                Err(e) => {
                    warn!("Unreadable OAuth callback body: {}", e);
                    None
                }
            }
        } else {
            serde_urlencoded::from_str::<CallbackParams>(parts.uri.query().unwrap_or_default()).ok()
        };
        let Some(params) = params else {
            return Ok(invalid_callback());
        };

        if let Some(error) = params.error.as_deref() {
            info!(%provider, "Provider returned an error: {}", error);
            return Ok(HandlerOutcome::Handled(self.login_error_redirect(error)?));
        }

        let (Some(code), Some(state)) = (params.code.as_deref(), params.state.as_deref()) else {
            return Ok(invalid_callback());
        };
        if !state_matches(&parts.headers, state) {
            warn!(%provider, "OAuth state mismatch");
            return Ok(invalid_callback());
        }

        match self.sign_in(provider, code, params.user.as_deref()).await {
            Ok(SignIn::Session(session)) => {
                let cookies = [session, self.state_cookie(provider, "")];
                Ok(HandlerOutcome::Handled(self.dashboard_redirect(&cookies)?))
            }
            Ok(SignIn::Rejected(message)) => Ok(HandlerOutcome::Handled(
                Error::BadRequest {
                    message: message.to_string(),
                }
                .into_response(),
            )),
            Err(err) => Ok(HandlerOutcome::Next(Some(err))),
        }
    }

    /// Exchange the code, resolve the identity and upsert the user. Returns the session cookie,
    /// or a rejection when the provider gave no email address or marked it unverified.
    async fn sign_in(&self, provider: Provider, code: &str, apple_user: Option<&str>) -> anyhow::Result<SignIn> {
        let config = provider.config(&self.config.oauth);
        let endpoints = provider.endpoints(config)?;

        let redirect_uri = self.redirect_uri(provider);
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", config.client_id.as_deref().unwrap_or_default()),
            ("client_secret", config.client_secret.as_deref().unwrap_or_default()),
        ];
        let tokens: TokenResponse = self
            .http
            .post(endpoints.token.clone())
            .form(&form)
            .send()
            .await
            .context("token request")?
            .error_for_status()
            .context("token exchange")?
            .json()
            .await
            .context("token response")?;

        let identity = match (provider, &endpoints.userinfo) {
            (Provider::Apple, _) => {
                let id_token = tokens.id_token.context("token response has no id_token")?;
                let mut identity = decode_id_token(&id_token)?;
                if identity.name.is_none() {
                    identity.name = apple_user.and_then(apple_display_name);
                }
                identity
            }
            (_, Some(userinfo)) => {
                let access_token = tokens.access_token.context("token response has no access_token")?;
                self.http
                    .get(userinfo.clone())
                    .bearer_auth(access_token)
                    .send()
                    .await
                    .context("userinfo request")?
                    .error_for_status()
                    .context("userinfo")?
                    .json::<Identity>()
                    .await
                    .context("userinfo response")?
            }
            (_, None) => anyhow::bail!("no userinfo endpoint configured for {provider}"),
        };

        if identity.email_unverified() {
            warn!(%provider, "Provider reports the email address as unverified");
            return Ok(SignIn::Rejected("The identity provider has not verified this email address"));
        }
        let Some(email) = identity.email.filter(|e| !e.trim().is_empty()) else {
            return Ok(SignIn::Rejected("The identity provider did not return an email address"));
        };

        let mut conn = self.db.connection().await.ok_or(DbError::StoreUnavailable)?;
        let user = Users::new(&mut conn)
            .upsert_oauth_user(&OAuthUserUpsert {
                email,
                display_name: identity.name,
                provider: provider.as_str().to_string(),
            })
            .await?;
        info!(%provider, email = %mask_email(&user.email), "User signed in");

        let claims = SessionClaims::new(&user, provider.as_str(), &self.config);
        let token = create_session_token(&claims, &self.config)?;
        Ok(SignIn::Session(session_cookie(&token, &self.config)))
    }

    fn sign_out(&self) -> anyhow::Result<Response> {
        self.dashboard_redirect(&[clear_session_cookie(&self.config)])
    }
}

#[async_trait::async_trait]
impl CallbackHandler for OAuthRouter {
    async fn handle(&self, request: Request) -> anyhow::Result<HandlerOutcome> {
        let path = request.uri().path().to_string();
        let Some(rest) = path.strip_prefix("/api/auth/") else {
            return Ok(HandlerOutcome::Next(None));
        };
        let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        let method = request.method().clone();

        match segments.as_slice() {
            ["signout"] if method == Method::POST => Ok(HandlerOutcome::Handled(self.sign_out()?)),
            [segment] if method == Method::GET => match self.enabled_provider(segment) {
                Some(provider) => Ok(HandlerOutcome::Handled(self.start(provider)?)),
                None => Ok(HandlerOutcome::Next(None)),
            },
            [segment, "callback"] if method == Method::GET || method == Method::POST => match self.enabled_provider(segment) {
                Some(provider) => self.callback(provider, request).await,
                None => Ok(HandlerOutcome::Next(None)),
            },
            _ => Ok(HandlerOutcome::Next(None)),
        }
    }
}

fn invalid_callback() -> HandlerOutcome {
    HandlerOutcome::Handled(
        Error::BadRequest {
            message: INVALID_CALLBACK.to_string(),
        }
        .into_response(),
    )
}

fn state_matches(headers: &HeaderMap, state: &str) -> bool {
    matches!(read_cookie(headers, STATE_COOKIE), Some(expected) if !expected.is_empty() && expected == state)
}

/// Claims of an ID token received directly from the provider's token endpoint over TLS
fn decode_id_token(id_token: &str) -> anyhow::Result<Identity> {
    let payload = id_token.split('.').nth(1).context("malformed id_token")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("id_token payload is not base64url")?;
    serde_json::from_slice(&bytes).context("id_token payload is not JSON")
}

fn apple_display_name(user: &str) -> Option<String> {
    let name = serde_json::from_str::<AppleUser>(user).ok()?.name?;
    let full = [name.first_name, name.last_name]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!full.is_empty()).then_some(full)
}
