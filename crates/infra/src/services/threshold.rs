//! Threshold monitor: stock alerts after quantity changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use stockroom_inventory::{Item, Notification, StockAlert};

use crate::error::InventoryError;
use crate::notifier::Notifier;
use crate::store::SharedStore;

#[derive(Clone)]
pub struct ThresholdMonitor {
    store: SharedStore,
    notifier: Arc<dyn Notifier>,
    alert_roles: Vec<String>,
}

impl ThresholdMonitor {
    pub fn new(store: SharedStore, notifier: Arc<dyn Notifier>, alert_roles: Vec<String>) -> Self {
        Self {
            store,
            notifier,
            alert_roles,
        }
    }

    /// Classify `item` and raise its alert for every warehouse-facing user.
    ///
    /// Users who already hold the same unread alert for this item are skipped.
    /// Returns the notifications that were inserted and handed to the notifier.
    pub async fn check(&self, item: &Item, now: DateTime<Utc>) -> Result<Vec<Notification>, InventoryError> {
        let Some(alert) = StockAlert::classify(item) else {
            return Ok(Vec::new());
        };

        if alert == StockAlert::Negative {
            error!(
                tenant_id = %item.tenant_id,
                item_id = %item.id,
                quantity = item.quantity,
                "negative stock"
            );
        }

        let recipients = self
            .store
            .users_with_roles(item.tenant_id, &self.alert_roles)
            .await?;
        if recipients.is_empty() {
            return Ok(Vec::new());
        }

        let message = alert.message(item);
        let candidates = recipients
            .iter()
            .map(|user| {
                Notification::new(
                    item.tenant_id,
                    user.id,
                    alert.kind(),
                    alert.title(),
                    message.clone(),
                    Some(item.id),
                    now,
                )
            })
            .collect();

        let inserted = self.store.insert_alerts(candidates).await?;
        self.deliver(&inserted).await;
        Ok(inserted)
    }

    /// Run [`check`](Self::check) after a committed change.
    ///
    /// The stock change is already durable, so failures are logged rather
    /// than returned.
    pub async fn after_commit(&self, item: &Item, now: DateTime<Utc>) -> Vec<Notification> {
        match self.check(item, now).await {
            Ok(alerts) => alerts,
            Err(err) => {
                warn!(
                    tenant_id = %item.tenant_id,
                    item_id = %item.id,
                    error = %err,
                    "stock alert evaluation failed"
                );
                Vec::new()
            }
        }
    }

    /// Hand persisted notifications to the notifier; failures are logged.
    pub async fn deliver(&self, notifications: &[Notification]) {
        for notification in notifications {
            if let Err(err) = self.notifier.deliver(notification).await {
                warn!(
                    notification_id = %notification.id,
                    user_id = %notification.user_id,
                    error = %err,
                    "notification delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;
    use crate::store::{InMemoryStockStore, StockStore};
    use stockroom_core::TenantId;
    use stockroom_inventory::{NewItem, NotificationKind, User};

    async fn setup(notifier: Arc<RecordingNotifier>) -> (Arc<InMemoryStockStore>, ThresholdMonitor, TenantId, Vec<User>) {
        let store = Arc::new(InMemoryStockStore::new());
        let tenant = TenantId::new();
        let mut users = Vec::new();
        for (name, role) in [("Ana", "warehouse"), ("Boris", "admin"), ("Cleo", "sales")] {
            users.push(store.insert_user(User::new(tenant, name, role)).await.unwrap());
        }
        let monitor = ThresholdMonitor::new(
            store.clone(),
            notifier,
            vec!["admin".into(), "management".into(), "warehouse".into()],
        );
        (store, monitor, tenant, users)
    }

    fn item(tenant: TenantId, quantity: i64) -> Item {
        let mut item = NewItem::named("T-Shirt").into_item(tenant, Utc::now()).unwrap();
        item.quantity = quantity;
        item
    }

    #[tokio::test]
    async fn low_stock_alerts_only_warehouse_facing_roles() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (_, monitor, tenant, users) = setup(notifier.clone()).await;

        let alerts = monitor.check(&item(tenant, 8), Utc::now()).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|n| n.title == "Low stock" && n.kind == NotificationKind::Warning));
        assert!(!alerts.iter().any(|n| n.user_id == users[2].id));
        assert_eq!(notifier.delivered().len(), 2);
    }

    #[tokio::test]
    async fn repeated_checks_do_not_duplicate_unread_alerts() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (store, monitor, tenant, users) = setup(notifier.clone()).await;
        let item = item(tenant, 9);

        monitor.check(&item, Utc::now()).await.unwrap();
        let again = monitor.check(&item, Utc::now()).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(store.notifications_for(tenant, users[0].id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn healthy_stock_raises_nothing() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (_, monitor, tenant, _) = setup(notifier.clone()).await;
        assert!(monitor.check(&item(tenant, 11), Utc::now()).await.unwrap().is_empty());
        assert!(notifier.delivered().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_persisted_alert() {
        let notifier = Arc::new(RecordingNotifier::failing());
        let (store, monitor, tenant, users) = setup(notifier).await;

        let alerts = monitor.after_commit(&item(tenant, 0), Utc::now()).await;
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].title, "Critical stock");
        assert_eq!(store.notifications_for(tenant, users[1].id).await.unwrap().len(), 1);
    }
}
