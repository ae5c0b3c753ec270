//! Delivery of created notifications to the host.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use stockroom_inventory::Notification;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivers notifications that the store has already persisted.
///
/// Called after the stock unit of work commits; a failure here never undoes
/// the stock change.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes each notification to the log. Default for hosts without a push channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            target: "stockroom::notify",
            tenant_id = %notification.tenant_id,
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Keeps delivered notifications in memory; useful for hosts that poll and for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Delivery("channel unavailable".to_string()));
        }
        self.delivered
            .lock()
            .map_err(|_| NotifyError::Delivery("lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
