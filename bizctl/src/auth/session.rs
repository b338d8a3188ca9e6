//! JWT session token creation and verification.

use axum::http::{HeaderMap, header};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::{config::Config, db::models::users::UserDBResponse, errors::Error, types::UserId};

/// JWT session claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionClaims {
    #[schema(value_type = String, format = "uuid")]
    pub sub: UserId,              // Subject (user ID)
    pub email: String,            // User email
    pub username: Option<String>, // Username, if the account has one
    pub provider: String,         // Identity provider used to sign in
    pub exp: i64,                 // Expiration time
    pub iat: i64,                 // Issued at
}

impl SessionClaims {
    /// Create new session claims for a user who just signed in through `provider`
    pub fn new(user: &UserDBResponse, provider: &str, config: &Config) -> Self {
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(config.session.expiry.as_secs()).unwrap_or(i64::MAX);

        Self {
            sub: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            provider: provider.to_string(),
            exp: now.saturating_add(lifetime),
            iat: now,
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config
        .secret_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| Error::Internal {
            operation: "JWT sessions: secret_key is required".to_string(),
        })
}

/// Create a JWT token for a user session
pub fn create_session_token(claims: &SessionClaims, config: &Config) -> Result<String, Error> {
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());
    encode(&Header::default(), claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode a JWT session token
pub fn verify_session_token(token: &str, config: &Config) -> Result<SessionClaims, Error> {
    use jsonwebtoken::errors::ErrorKind;

    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<SessionClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::ExpiredSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::RsaFailedSigning
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::MissingAlgorithm
        | ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    Ok(token_data.claims)
}

/// Value of the named cookie in the request's `Cookie` headers
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// The signed-in session carried by the request, if any. Invalid or expired tokens count as
/// signed out.
pub fn session_from_headers(headers: &HeaderMap, config: &Config) -> Option<SessionClaims> {
    let token = read_cookie(headers, &config.session.cookie_name)?;
    match verify_session_token(token, config) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!("Ignoring session cookie: {}", e);
            None
        }
    }
}

fn same_site(config: &Config) -> &'static str {
    match config.session.cookie_same_site.to_ascii_lowercase().as_str() {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}

/// `Set-Cookie` value carrying a session token
pub fn session_cookie(token: &str, config: &Config) -> String {
    let session = &config.session;
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        session.cookie_name,
        token,
        same_site(config),
        session.expiry.as_secs()
    );
    if session.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(config: &Config) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite={}; Max-Age=0",
        config.session.cookie_name,
        same_site(config)
    );
    if config.session.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;
    use uuid::Uuid;

    fn create_test_config() -> Config {
        let mut config = Config {
            secret_key: Some("test-secret-key-for-jwt".to_string()),
            ..Default::default()
        };
        config.session.expiry = Duration::from_secs(3600);
        config
    }

    fn create_test_claims(config: &Config) -> SessionClaims {
        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            username: Some("testuser".to_string()),
            display_name: None,
            auth_source: "google".to_string(),
            created_at: now,
            updated_at: now,
            last_login: Some(now),
        };
        SessionClaims::new(&user, "google", config)
    }

    #[test]
    fn test_create_and_verify_session_token() {
        let config = create_test_config();
        let claims = create_test_claims(&config);
        assert_eq!(claims.exp - claims.iat, 3600);

        let token = create_session_token(&claims, &config).unwrap();
        assert!(!token.is_empty());

        let verified = verify_session_token(&token, &config).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn test_missing_secret_is_internal() {
        let mut config = create_test_config();
        let claims = create_test_claims(&config);
        config.secret_key = None;

        assert!(matches!(create_session_token(&claims, &config), Err(Error::Internal { .. })));
        assert!(matches!(verify_session_token("a.b.c", &config), Err(Error::Internal { .. })));
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let mut config = create_test_config();
        let token = create_session_token(&create_test_claims(&config), &config).unwrap();

        config.secret_key = Some("different-secret".to_string());
        let result = verify_session_token(&token, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_expired_token() {
        let config = create_test_config();
        let mut claims = create_test_claims(&config);
        claims.exp = (Utc::now() - chrono::Duration::seconds(3600)).timestamp();

        let key = EncodingKey::from_secret(b"test-secret-key-for-jwt");
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let result = verify_session_token(&token, &config);
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_malformed_token() {
        let config = create_test_config();

        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            let result = verify_session_token(token, &config);
            assert!(
                matches!(result.unwrap_err(), Error::Unauthenticated { .. }),
                "Expected Unauthenticated error for token: {token}"
            );
        }
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; bizctl_session=abc.def"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(read_cookie(&headers, "bizctl_session"), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "other"), Some("1"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_session_from_headers() {
        let config = create_test_config();
        let claims = create_test_claims(&config);
        let token = create_session_token(&claims, &config).unwrap();

        let mut headers = HeaderMap::new();
        assert!(session_from_headers(&headers, &config).is_none());

        headers.insert(header::COOKIE, format!("bizctl_session={token}").parse().unwrap());
        assert_eq!(session_from_headers(&headers, &config), Some(claims));

        headers.insert(header::COOKIE, HeaderValue::from_static("bizctl_session=garbage"));
        assert!(session_from_headers(&headers, &config).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let mut config = create_test_config();
        let cookie = session_cookie("tok", &config);
        assert_eq!(cookie, "bizctl_session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600; Secure");

        config.session.cookie_secure = false;
        config.session.cookie_same_site = "strict".to_string();
        assert_eq!(
            clear_session_cookie(&config),
            "bizctl_session=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0"
        );
    }
}
