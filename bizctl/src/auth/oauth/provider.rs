//! Identity providers and their endpoints.

use std::fmt;

use url::Url;

use crate::config::{OAuthConfig, ProviderConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    Microsoft,
    Apple,
}

/// Resolved endpoints for one provider
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize: Url,
    pub token: Url,
    /// Apple has no userinfo endpoint; its identity comes from the `id_token`
    pub userinfo: Option<Url>,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Microsoft, Provider::Apple];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Microsoft => "microsoft",
            Provider::Apple => "apple",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == segment)
    }

    pub fn config<'a>(&self, oauth: &'a OAuthConfig) -> &'a ProviderConfig {
        match self {
            Provider::Google => &oauth.google,
            Provider::Microsoft => &oauth.microsoft,
            Provider::Apple => &oauth.apple,
        }
    }

    /// Apple posts the callback as a form, which needs a cross-site cookie
    pub fn uses_form_post(&self) -> bool {
        matches!(self, Provider::Apple)
    }

    pub fn default_scopes(&self) -> &'static [&'static str] {
        match self {
            Provider::Google | Provider::Microsoft => &["openid", "email", "profile"],
            Provider::Apple => &["name", "email"],
        }
    }

    pub fn scope(&self, config: &ProviderConfig) -> String {
        match &config.scopes {
            Some(scopes) => scopes.join(" "),
            None => self.default_scopes().join(" "),
        }
    }

    /// Public endpoints, with any configured overrides applied
    pub fn endpoints(&self, config: &ProviderConfig) -> Result<ProviderEndpoints, url::ParseError> {
        let (authorize, token, userinfo) = match self {
            Provider::Google => (
                Url::parse("https://accounts.google.com/o/oauth2/v2/auth")?,
                Url::parse("https://oauth2.googleapis.com/token")?,
                Some(Url::parse("https://openidconnect.googleapis.com/v1/userinfo")?),
            ),
            Provider::Microsoft => {
                let tenant = config.tenant.as_deref().unwrap_or("common");
                let base = format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0");
                (
                    Url::parse(&format!("{base}/authorize"))?,
                    Url::parse(&format!("{base}/token"))?,
                    Some(Url::parse("https://graph.microsoft.com/oidc/userinfo")?),
                )
            }
            Provider::Apple => (
                Url::parse("https://appleid.apple.com/auth/authorize")?,
                Url::parse("https://appleid.apple.com/auth/token")?,
                None,
            ),
        };

        Ok(ProviderEndpoints {
            authorize: config.authorize_url.clone().unwrap_or(authorize),
            token: config.token_url.clone().unwrap_or(token),
            userinfo: config.userinfo_url.clone().or(userinfo),
        })
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
