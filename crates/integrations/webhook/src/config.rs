use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Authentication applied to every webhook request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },

    /// HTTP Basic authentication.
    Basic { username: String, password: String },

    /// API key sent in a custom header.
    ApiKey { header: String, value: String },

    /// Hex-encoded `HMAC-SHA256(secret, body)` sent as `sha256=<hex>`.
    HmacSha256 {
        secret: String,
        #[serde(default = "default_signature_header")]
        header: String,
    },
}

fn default_signature_header() -> String {
    "X-Remedy-Signature".to_owned()
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::ApiKey { header, .. } => f
                .debug_struct("ApiKey")
                .field("header", header)
                .field("value", &"[REDACTED]")
                .finish(),
            Self::HmacSha256 { header, .. } => f
                .debug_struct("HmacSha256")
                .field("secret", &"[REDACTED]")
                .field("header", header)
                .finish(),
        }
    }
}

/// Endpoint settings shared by the webhook executor and notifier.
///
/// `url` is the executor target; the notifier posts to each channel's own
/// `webhook_url` and only uses the timeout, headers, and auth from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub auth: Option<AuthMethod>,
}

fn default_timeout_secs() -> u64 {
    10
}

impl WebhookConfig {
    /// POST to `url` with a 10 second timeout and no auth.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: default_timeout_secs(),
            headers: HashMap::new(),
            auth: None,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rollback endpoint: `<url>/rollback`.
    pub fn rollback_url(&self) -> String {
        format!("{}/rollback", self.url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WebhookConfig::new("https://ops.example.com/scale");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.auth.is_none());
        assert!(config.headers.is_empty());
    }

    #[test]
    fn rollback_url_appends_segment() {
        assert_eq!(
            WebhookConfig::new("https://ops.example.com/scale/").rollback_url(),
            "https://ops.example.com/scale/rollback"
        );
    }

    #[test]
    fn deserializes_from_toml() {
        let config: WebhookConfig = toml::from_str(
            r#"
url = "https://ops.example.com/restart"
timeout_secs = 3

[headers]
X-Team = "sre"

[auth]
type = "hmac_sha256"
secret = "s3cret"
"#,
        )
        .unwrap();
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.headers["X-Team"], "sre");
        assert_eq!(
            config.auth,
            Some(AuthMethod::HmacSha256 {
                secret: "s3cret".into(),
                header: "X-Remedy-Signature".into(),
            })
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let token = "tok-placeholder";
        let debug = format!("{:?}", AuthMethod::Bearer { token: token.into() });
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(token));

        let password = "pw-placeholder";
        let debug = format!(
            "{:?}",
            AuthMethod::Basic {
                username: "ops".into(),
                password: password.into(),
            }
        );
        assert!(debug.contains("ops"));
        assert!(!debug.contains(password));

        let secret = "hmac-placeholder";
        let debug = format!(
            "{:?}",
            AuthMethod::HmacSha256 {
                secret: secret.into(),
                header: "X-Sig".into(),
            }
        );
        assert!(debug.contains("X-Sig"));
        assert!(!debug.contains(secret));
    }
}
