//! One HTTP exchange with unavailable-status backoff.
//!
//! The transport owns exactly one concern: turn a URL and a JSON body into a
//! raw response. It retries only when the server answers 503 (temporarily
//! unavailable), sleeping per the configured [`RetryPolicy`](crate::RetryPolicy)
//! between attempts. Timeouts and connection failures abort immediately, and
//! redirects are never followed here; the classifier and credential guard
//! decide what a 3xx means.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use http::StatusCode;
use serde_json::Value;
use url::Url;

/// A raw HTTP response: status, redirect target, body text.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

pub(crate) struct Transport {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Transport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Executes one logical request, retrying only on 503.
    pub async fn execute(&self, url: &Url, body: &Value) -> Result<RawResponse> {
        let mut used_retries = 0u32;
        loop {
            tracing::debug!(%url, attempt = used_retries + 1, "executing HTTP request");

            let response = self
                .http
                .post(url.clone())
                .timeout(self.config.timeout)
                .json(body)
                .send()
                .await
                .map_err(classify_reqwest)?;

            let status = response.status();
            if status == StatusCode::SERVICE_UNAVAILABLE
                && used_retries < self.config.retry.max_retries
            {
                let delay = self.config.retry.delay_for(used_retries);
                tracing::warn!(
                    %url,
                    used_retries,
                    delay_ms = delay.as_millis() as u64,
                    "temporarily unavailable, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                used_retries += 1;
                continue;
            }

            let location = response
                .headers()
                .get(http::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response.text().await.map_err(classify_reqwest)?;

            tracing::info!(
                %url,
                status = status.as_u16(),
                attempts = used_retries + 1,
                "received HTTP response"
            );
            return Ok(RawResponse {
                status,
                location,
                body,
            });
        }
    }
}

fn classify_reqwest(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout(error)
    } else {
        Error::Connection(error)
    }
}
