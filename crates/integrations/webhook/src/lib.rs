//! HTTP webhook integration: an [`Executor`](remedy_provider::Executor)
//! that hands remediations to an automation endpoint and a
//! [`Notifier`](remedy_provider::Notifier) for Slack, `PagerDuty`, and
//! generic webhook channels.
//!
//! ```rust,no_run
//! use remedy_webhook::{AuthMethod, WebhookClient, WebhookConfig, WebhookExecutor, WebhookNotifier};
//!
//! let config = WebhookConfig::new("https://automation.example.com/scale")
//!     .with_auth(AuthMethod::Bearer { token: "token-123".into() })
//!     .with_timeout_secs(15);
//! let executor = WebhookExecutor::new("scaler", config).unwrap();
//!
//! let notifier = WebhookNotifier::new(WebhookClient::new(WebhookConfig::new("")).unwrap());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod notifier;

#[cfg(test)]
mod testing;

pub use client::WebhookClient;
pub use config::{AuthMethod, WebhookConfig};
pub use error::WebhookError;
pub use executor::WebhookExecutor;
pub use notifier::{WebhookNotifier, render};
