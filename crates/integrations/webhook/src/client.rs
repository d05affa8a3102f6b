use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::{AuthMethod, WebhookConfig};
use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// JSON-over-HTTP transport with the configured headers and auth applied.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    config: WebhookConfig,
    client: Client,
}

impl WebhookClient {
    /// Build a client whose requests time out after `config.timeout()`.
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, client })
    }

    /// Reuse an existing connection pool. The per-request timeout still
    /// comes from `config`.
    pub fn with_client(config: WebhookConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Hex-encoded HMAC-SHA256 of `body`.
    pub fn sign(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| WebhookError::SigningError(format!("invalid HMAC key: {e}")))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn apply_auth(
        &self,
        request: reqwest::RequestBuilder,
        body: &[u8],
    ) -> Result<reqwest::RequestBuilder, WebhookError> {
        Ok(match &self.config.auth {
            Some(AuthMethod::Bearer { token }) => request.bearer_auth(token),
            Some(AuthMethod::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            Some(AuthMethod::ApiKey { header, value }) => request.header(header, value),
            Some(AuthMethod::HmacSha256 { secret, header }) => {
                let signature = Self::sign(secret, body)?;
                request.header(header, format!("sha256={signature}"))
            }
            None => request,
        })
    }

    /// POST `body` as JSON to `url` and return the response body.
    ///
    /// A non-JSON success body is wrapped as `{"status", "body"}`. Any
    /// non-2xx status is an error.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<serde_json::Value, WebhookError> {
        let bytes =
            serde_json::to_vec(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        debug!(url, bytes = bytes.len(), "posting webhook");

        let mut request = self
            .client
            .post(url)
            .timeout(self.config.timeout())
            .header("Content-Type", "application/json");
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }
        let request = self.apply_auth(request, &bytes)?.body(bytes);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(url, "webhook request timed out");
                WebhookError::Timeout(self.config.timeout())
            } else {
                WebhookError::Http(e)
            }
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            warn!(url, status, "webhook endpoint returned an error status");
            return Err(WebhookError::UnexpectedStatus { status, body: text });
        }

        if text.trim().is_empty() {
            return Ok(json!({ "status": status }));
        }
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "status": status, "body": text })))
    }
}
