//! Shared fixtures for unit and integration tests.

use std::{path::Path, time::Duration};

use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::session::SessionClaims,
    config::{Config, DatabaseConfig, EmailTransportConfig, PoolSettings},
};

pub use crate::install_crypto_provider;

/// A config that writes outbound email to `email_dir` and signs sessions with a fixed key.
/// No database URL and no OAuth providers are configured.
pub fn create_test_config(email_dir: &Path) -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: "http://localhost:3000".to_string(),
        dashboard_url: "http://localhost:3001".to_string(),
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        database: DatabaseConfig {
            url: None,
            run_migrations: false,
            pool: PoolSettings {
                max_connections: 2,
                acquire_timeout_secs: 2,
                ..Default::default()
            },
        },
        ..Default::default()
    };
    config.email.transport = EmailTransportConfig::File {
        path: email_dir.to_string_lossy().into_owned(),
    };
    config.email.from_email = "noreply@bizctl.test".to_string();
    config.email.from_name = "Bizctl Test".to_string();
    config.session.cookie_secure = false;
    config
}

/// Raw `.eml` messages written by the file transport into `dir`
pub fn read_sent_emails(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "eml"))
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .collect()
}

/// Poll `dir` until at least `count` messages arrive, for mail sent off the request path.
/// Gives up after a few seconds and returns whatever is there.
pub async fn wait_for_sent_emails(dir: &Path, count: usize) -> Vec<String> {
    for _ in 0..50 {
        let sent = read_sent_emails(dir);
        if sent.len() >= count {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    read_sent_emails(dir)
}

/// Valid claims for a user who signed in with Google a moment ago
pub fn create_test_session(config: &Config) -> SessionClaims {
    let now = Utc::now().timestamp();
    SessionClaims {
        sub: Uuid::new_v4(),
        email: "session@example.com".to_string(),
        username: Some("session_user".to_string()),
        provider: "google".to_string(),
        exp: now + config.session.expiry.as_secs() as i64,
        iat: now,
    }
}
