//! Credentials and request authentication.
//!
//! Exactly one of two authentication styles applies to every request: a
//! webhook credential embeds its pre-shared key as a URL path segment and
//! leaves the parameters untouched, while a token credential merges its
//! access token into the parameter map as `auth`. The credential is the one
//! piece of shared mutable state in the client; only the credential guard
//! writes to it (domain changes, token refreshes).

use crate::error::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

/// Authentication material for a portal.
#[derive(Debug, Clone)]
pub enum Credential {
    /// A pre-shared secret embedded directly in the request URL.
    Webhook {
        /// Portal domain, e.g. `example.portal.com`. A scheme prefix is
        /// honored when present; `https` is assumed otherwise.
        domain: String,
        /// The webhook key path segment, e.g. `17/abc123xyz`.
        key: String,
    },
    /// An OAuth access/refresh token pair for an installed application.
    Token {
        /// Portal domain.
        domain: String,
        /// Current access token, sent as the `auth` parameter.
        access_token: String,
        /// Refresh token used by the credential guard.
        refresh_token: String,
        /// Application id for the refresh exchange.
        client_id: String,
        /// Application secret for the refresh exchange.
        client_secret: String,
    },
}

impl Credential {
    /// Creates a webhook credential.
    pub fn webhook(domain: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Webhook {
            domain: domain.into(),
            key: key.into(),
        }
    }

    /// Creates an OAuth token credential.
    pub fn token(
        domain: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::Token {
            domain: domain.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// The currently configured portal domain.
    pub fn domain(&self) -> &str {
        match self {
            Self::Webhook { domain, .. } | Self::Token { domain, .. } => domain,
        }
    }

    /// Whether this is a webhook credential (never refreshed).
    pub fn is_webhook(&self) -> bool {
        matches!(self, Self::Webhook { .. })
    }

    pub(crate) fn set_domain(&mut self, new_domain: String) {
        match self {
            Self::Webhook { domain, .. } | Self::Token { domain, .. } => *domain = new_domain,
        }
    }

    pub(crate) fn apply_tokens(&mut self, pair: &TokenPair) {
        if let Self::Token {
            access_token,
            refresh_token,
            ..
        } = self
        {
            *access_token = pair.access_token.clone();
            *refresh_token = pair.refresh_token.clone();
        }
    }

    /// The base URL for the configured domain.
    pub(crate) fn base_url(&self) -> Result<Url> {
        let domain = self.domain();
        let base = if domain.contains("://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };
        Ok(Url::parse(&base)?)
    }

    /// Builds the invocation URL for a method: the webhook key is a path
    /// segment, token credentials authenticate via parameters instead.
    pub(crate) fn method_url(&self, method: &str) -> Result<Url> {
        let mut url = self.base_url()?;
        let path = match self {
            Self::Webhook { key, .. } => {
                format!("/rest/{}/{}.json", key.trim_matches('/'), method)
            }
            Self::Token { .. } => format!("/rest/{}.json", method),
        };
        url.set_path(&path);
        Ok(url)
    }

    /// Merges authentication into the parameter map where required.
    pub(crate) fn apply_auth(&self, params: &mut Map<String, Value>) {
        if let Self::Token { access_token, .. } = self {
            params.insert("auth".into(), Value::String(access_token.clone()));
        }
    }

    pub(crate) fn refresh_material(&self) -> Option<(&str, &str, &str)> {
        match self {
            Self::Token {
                refresh_token,
                client_id,
                client_secret,
                ..
            } => Some((refresh_token, client_id, client_secret)),
            Self::Webhook { .. } => None,
        }
    }
}

/// The access/refresh pair returned by a token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    /// The new access token.
    pub access_token: String,
    /// The new refresh token.
    pub refresh_token: String,
}

/// `host[:port]` of a URL, used to decide whether a redirect crosses hosts.
pub(crate) fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn webhook_embeds_key_in_path_and_leaves_params_alone() {
        let cred = Credential::webhook("example.portal.com", "17/abc123");
        let url = cred.method_url("tasks.task.list").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.portal.com/rest/17/abc123/tasks.task.list.json"
        );

        let mut params = Map::new();
        params.insert("select".into(), json!(["ID"]));
        cred.apply_auth(&mut params);
        assert!(!params.contains_key("auth"));
    }

    #[test]
    fn token_authenticates_via_params_not_path() {
        let cred = Credential::token("example.portal.com", "at", "rt", "id", "secret");
        let url = cred.method_url("tasks.task.list").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.portal.com/rest/tasks.task.list.json"
        );

        let mut params = Map::new();
        cred.apply_auth(&mut params);
        assert_eq!(params.get("auth"), Some(&json!("at")));
    }

    #[test]
    fn explicit_scheme_is_honored() {
        let cred = Credential::webhook("http://127.0.0.1:8080", "1/k");
        let url = cred.method_url("profile").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/rest/1/k/profile.json");
    }

    #[test]
    fn authority_includes_port() {
        let url = Url::parse("http://127.0.0.1:8080/rest/profile.json").unwrap();
        assert_eq!(authority(&url), "127.0.0.1:8080");
        let url = Url::parse("https://example.portal.com/x").unwrap();
        assert_eq!(authority(&url), "example.portal.com");
    }
}
