//! Facade bundling every ledger service over one injected store.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use stockroom_core::{NotificationId, TenantId, UserId};
use stockroom_inventory::{Item, Location, NewItem, NewLocation, Notification, User};

use crate::config::InventoryConfig;
use crate::error::InventoryError;
use crate::notifier::Notifier;
use crate::services::{
    LedgerQueries, Reconciler, ReservationManager, StockAdjuster, ThresholdMonitor, TransferCoordinator,
    UnitRunner,
};
use crate::store::{SharedStore, StockStore};

/// Entry point for hosts.
///
/// Built once per process with an explicit store and notifier; cheap to clone.
#[derive(Clone)]
pub struct Stockroom {
    store: SharedStore,
    config: Arc<InventoryConfig>,
    monitor: ThresholdMonitor,
    reservations: ReservationManager,
    transfers: TransferCoordinator,
    adjuster: StockAdjuster,
    ledger: LedgerQueries,
    reconciler: Reconciler,
}

impl Stockroom {
    pub fn new<S>(store: Arc<S>, notifier: Arc<dyn Notifier>, config: InventoryConfig) -> Self
    where
        S: StockStore + 'static,
    {
        let store: SharedStore = store;
        let runner = UnitRunner::new(store.clone(), config.retry.clone(), config.negative_stock);
        let monitor = ThresholdMonitor::new(store.clone(), notifier, config.alert_roles.clone());

        Self {
            reservations: ReservationManager::new(runner.clone(), monitor.clone()),
            transfers: TransferCoordinator::new(runner.clone(), monitor.clone()),
            adjuster: StockAdjuster::new(runner.clone(), monitor.clone()),
            ledger: LedgerQueries::new(store.clone(), config.admin_role.clone()),
            reconciler: Reconciler::new(runner, monitor.clone(), config.admin_role.clone()),
            monitor,
            store,
            config: Arc::new(config),
        }
    }

    pub fn reservations(&self) -> &ReservationManager {
        &self.reservations
    }

    pub fn transfers(&self) -> &TransferCoordinator {
        &self.transfers
    }

    pub fn adjuster(&self) -> &StockAdjuster {
        &self.adjuster
    }

    pub fn ledger(&self) -> &LedgerQueries {
        &self.ledger
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn monitor(&self) -> &ThresholdMonitor {
        &self.monitor
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Register a new item with zero stock.
    #[instrument(skip(self, new_item), fields(tenant_id = %tenant_id), err)]
    pub async fn create_item(&self, tenant_id: TenantId, new_item: NewItem) -> Result<Item, InventoryError> {
        let item = new_item.into_item(tenant_id, Utc::now())?;
        Ok(self.store.insert_item(item).await?)
    }

    #[instrument(skip(self, new_location), fields(tenant_id = %tenant_id), err)]
    pub async fn create_location(
        &self,
        tenant_id: TenantId,
        new_location: NewLocation,
    ) -> Result<Location, InventoryError> {
        let location = new_location.into_location(tenant_id)?;
        Ok(self.store.insert_location(location).await?)
    }

    /// Mirror a user from the host's directory.
    pub async fn register_user(
        &self,
        tenant_id: TenantId,
        name: &str,
        role: &str,
    ) -> Result<User, InventoryError> {
        let name = stockroom_core::ensure_not_blank("user name", name)?;
        Ok(self.store.insert_user(User::new(tenant_id, name, role)).await?)
    }

    pub async fn notifications(&self, tenant_id: TenantId, user_id: UserId) -> Result<Vec<Notification>, InventoryError> {
        Ok(self.store.notifications_for(tenant_id, user_id).await?)
    }

    pub async fn mark_notification_read(
        &self,
        tenant_id: TenantId,
        notification_id: NotificationId,
    ) -> Result<(), InventoryError> {
        if self.store.mark_notification_read(tenant_id, notification_id).await? {
            Ok(())
        } else {
            Err(InventoryError::NotFound(format!("notification {notification_id}")))
        }
    }
}
