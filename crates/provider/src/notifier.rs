use async_trait::async_trait;
use remedy_core::{Notification, NotificationChannel};

use crate::error::DependencyError;

/// Delivers a [`Notification`] to a configured channel.
///
/// One notifier may serve several channels; the channel definition carries
/// the target URL and recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
    ) -> Result<(), DependencyError>;
}
