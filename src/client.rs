//! The client: single-call entry point and the credential guard.
//!
//! [`Client`] is cheap to clone and holds its state behind an `Arc`. Every
//! network call, including the batch calls the paginators issue, funnels
//! through [`Client::call`]'s guarded path, which recovers at most once each
//! from a cross-host redirect (portal moved) and from an expired access token
//! (refresh-and-retry). Anything else propagates unchanged.
//!
//! The credential is the only shared mutable state; it lives behind an
//! `RwLock` so guard updates are visible to every clone of the client.

use crate::classify::classify;
use crate::config::ClientConfig;
use crate::credential::{authority, Credential, TokenPair};
use crate::envelope::ApiEnvelope;
use crate::error::{ApiError, ApiErrorKind, Error, ErrorRecord, Result};
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use serde_json::{json, Map, Value};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use url::Url;

type TokenRenewedHook = Box<dyn Fn(&TokenPair) + Send + Sync>;
type DomainChangedHook = Box<dyn Fn(&str) + Send + Sync>;

/// A client for one portal, bound to one credential.
///
/// # Examples
///
/// ```no_run
/// use restive::{Client, Credential};
/// use serde_json::json;
///
/// # async fn example() -> restive::Result<()> {
/// let client = Client::builder()
///     .credential(Credential::webhook("example.portal.com", "17/abc123"))
///     .build()?;
///
/// let envelope = client
///     .call("crm.deal.get", json!({"id": 7}))
///     .await?;
/// println!("deal: {}", envelope.result);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    transport: Transport,
    config: ClientConfig,
    credential: RwLock<Credential>,
    on_token_renewed: Option<TokenRenewedHook>,
    on_domain_changed: Option<DomainChangedHook>,
}

impl Client {
    /// Creates a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The currently configured portal domain. May change after a cross-host
    /// redirect recovery.
    pub fn domain(&self) -> String {
        self.read_credential().domain().to_string()
    }

    /// Executes one logical operation and returns its parsed envelope.
    ///
    /// `params` must be a JSON object or `Null`. The call is guarded: an
    /// expired token or a cross-host redirect is recovered once, any other
    /// failure propagates as a typed [`Error`].
    pub async fn call(&self, method: &str, params: Value) -> Result<ApiEnvelope> {
        self.guarded_call(method, &params).await
    }

    /// The guarded execution path shared by `call` and the batch assembler.
    ///
    /// Per invocation each recovery branch fires at most once, in whichever
    /// order its triggering error arrives; a further failure of any kind
    /// propagates.
    pub(crate) async fn guarded_call(&self, method: &str, params: &Value) -> Result<ApiEnvelope> {
        let mut domain_recovered = false;
        let mut token_recovered = false;
        loop {
            let error = match self.raw_call(method, params).await {
                Ok(envelope) => return Ok(envelope),
                Err(error) => error,
            };

            if !domain_recovered {
                if let Some(new_domain) = self.redirect_target(&error) {
                    tracing::info!(method, domain = %new_domain, "portal moved, retrying against new domain");
                    self.change_domain(new_domain);
                    domain_recovered = true;
                    continue;
                }
            }

            if !token_recovered
                && error.api_kind() == Some(ApiErrorKind::ExpiredToken)
                && self.can_refresh()
            {
                tracing::info!(method, "access token expired, refreshing");
                self.refresh_tokens().await?;
                token_recovered = true;
                continue;
            }

            return Err(error);
        }
    }

    /// One unguarded call: auth application, transport, classification.
    async fn raw_call(&self, method: &str, params: &Value) -> Result<ApiEnvelope> {
        let (url, body) = {
            let credential = self.read_credential();
            let url = credential.method_url(method)?;
            let mut map = match params {
                Value::Object(map) => map.clone(),
                Value::Null => Map::new(),
                _ => {
                    return Err(Error::Configuration(
                        "method parameters must be a JSON object".into(),
                    ))
                }
            };
            credential.apply_auth(&mut map);
            (url, Value::Object(map))
        };

        let raw = self.inner.transport.execute(&url, &body).await?;
        classify(raw)
    }

    /// Resolves a redirect error to a new domain when it crosses hosts.
    fn redirect_target(&self, error: &Error) -> Option<String> {
        let Error::RedirectedResponse {
            location: Some(location),
            ..
        } = error
        else {
            return None;
        };
        let target = Url::parse(location).ok()?;
        target.host_str()?;

        let current = self.read_credential().base_url().ok()?;
        if authority(&target) == authority(&current) {
            // Same host: assumed to signal a client-side error, never followed.
            return None;
        }
        Some(format!("{}://{}", target.scheme(), authority(&target)))
    }

    fn change_domain(&self, new_domain: String) {
        self.inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_domain(new_domain.clone());
        if let Some(hook) = &self.inner.on_domain_changed {
            hook(&new_domain);
        }
    }

    fn can_refresh(&self) -> bool {
        self.inner.config.auto_refresh
            && self.inner.config.token_endpoint.is_some()
            && !self.read_credential().is_webhook()
    }

    /// Exchanges the refresh token for a new token pair and stores it.
    async fn refresh_tokens(&self) -> Result<()> {
        let mut url = self
            .inner
            .config
            .token_endpoint
            .clone()
            .ok_or_else(|| Error::Configuration("token endpoint not configured".into()))?;
        {
            let credential = self.read_credential();
            let (refresh_token, client_id, client_secret) = credential
                .refresh_material()
                .ok_or_else(|| Error::Configuration("webhook credentials cannot refresh".into()))?;
            url.query_pairs_mut()
                .append_pair("grant_type", "refresh_token")
                .append_pair("client_id", client_id)
                .append_pair("client_secret", client_secret)
                .append_pair("refresh_token", refresh_token);
        }

        let raw = self.inner.transport.execute(&url, &json!({})).await?;
        let status = raw.status;
        let value: Value = serde_json::from_str(&raw.body).map_err(|e| Error::Decode {
            status,
            raw_body: raw.body.clone(),
            reason: e.to_string(),
        })?;

        if let Some(code) = value.get("error").and_then(Value::as_str) {
            let code = code.to_ascii_uppercase();
            let description = value
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(ApiError {
                kind: ApiErrorKind::from_code(&code)
                    .or_else(|| ApiErrorKind::from_status(status))
                    .unwrap_or(ApiErrorKind::Other),
                record: ErrorRecord {
                    http_status: Some(status),
                    code,
                    description,
                },
                validation: None,
                raw_body: raw.body,
            }
            .into());
        }

        let pair: TokenPair = serde_json::from_value(value).map_err(|e| Error::Decode {
            status,
            raw_body: raw.body,
            reason: e.to_string(),
        })?;

        self.inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_tokens(&pair);
        tracing::info!("access token renewed");
        if let Some(hook) = &self.inner.on_token_renewed {
            hook(&pair);
        }
        Ok(())
    }

    fn read_credential(&self) -> std::sync::RwLockReadGuard<'_, Credential> {
        self.inner
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    credential: Option<Credential>,
    config: ClientConfig,
    on_token_renewed: Option<TokenRenewedHook>,
    on_domain_changed: Option<DomainChangedHook>,
}

impl ClientBuilder {
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self {
            credential: None,
            config: ClientConfig::default(),
            on_token_renewed: None,
            on_domain_changed: None,
        }
    }

    /// Sets the credential. Required.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the backoff policy for the temporarily-unavailable status.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Overrides the maximum commands per batch call.
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    /// Overrides the pagination page size.
    pub fn page_size(mut self, size: u64) -> Self {
        self.config.page_size = size;
        self
    }

    /// Enables or disables automatic token refresh (default: enabled).
    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.config.auto_refresh = enabled;
        self
    }

    /// Sets the OAuth endpoint used for refresh-token exchanges.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn token_endpoint(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.config.token_endpoint = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Registers a callback invoked after each successful token refresh.
    pub fn on_token_renewed(mut self, hook: impl Fn(&TokenPair) + Send + Sync + 'static) -> Self {
        self.on_token_renewed = Some(Box::new(hook));
        self
    }

    /// Registers a callback invoked after each domain change recovery.
    pub fn on_domain_changed(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_domain_changed = Some(Box::new(hook));
        self
    }

    /// Builds the configured [`Client`].
    ///
    /// # Errors
    ///
    /// Fails when no credential was provided, or when automatic refresh is
    /// enabled for a token credential without a token endpoint.
    pub fn build(self) -> Result<Client> {
        let credential = self
            .credential
            .ok_or_else(|| Error::Configuration("a credential is required".into()))?;

        if self.config.auto_refresh
            && !credential.is_webhook()
            && self.config.token_endpoint.is_none()
        {
            return Err(Error::Configuration(
                "automatic refresh requires a token endpoint".into(),
            ));
        }

        let transport = Transport::new(self.config.clone())?;
        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                config: self.config,
                credential: RwLock::new(credential),
                on_token_renewed: self.on_token_renewed,
                on_domain_changed: self.on_domain_changed,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_a_credential() {
        let result = Client::builder().build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn token_credential_with_refresh_needs_an_endpoint() {
        let result = Client::builder()
            .credential(Credential::token("d", "at", "rt", "id", "secret"))
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));

        // Disabling refresh lifts the requirement.
        let result = Client::builder()
            .credential(Credential::token("d", "at", "rt", "id", "secret"))
            .auto_refresh(false)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn webhook_credential_needs_no_endpoint() {
        let result = Client::builder()
            .credential(Credential::webhook("d", "1/k"))
            .build();
        assert!(result.is_ok());
    }
}
