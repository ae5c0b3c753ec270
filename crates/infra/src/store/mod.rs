//! Stock persistence.
//!
//! A [`StockStore`] owns the transaction boundary: `execute` locks one item and
//! its stock rows, plans the command and writes the whole changeset, or writes
//! nothing at all.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_core::{EntryId, ItemId, NotificationId, TenantId, UserId};
use stockroom_inventory::{
    Item, Location, Notification, StockCommand, StockLevel, TransferRecord, User,
};

use crate::error::StoreError;
use crate::ledger::{ActivityRow, LedgerFilter, LedgerRow, Page, Pagination, StockTotals};
use crate::unit_of_work::{Changeset, OperationContext};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;

/// Shared handle used by the services.
pub type SharedStore = Arc<dyn StockStore>;

#[async_trait]
pub trait StockStore: Send + Sync {
    /// Seed an item row. Items always start empty.
    async fn insert_item(&self, item: Item) -> Result<Item, StoreError>;

    /// Seed a location. At most one default per tenant.
    async fn insert_location(&self, location: Location) -> Result<Location, StoreError>;

    /// Seed a directory user.
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;

    async fn get_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Option<Item>, StoreError>;

    async fn get_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<Option<User>, StoreError>;

    /// Stock rows of one item joined with location names, ordered by location name.
    async fn item_stocks(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Vec<StockLevel>, StoreError>;

    /// Run one command as a single atomic unit of work.
    ///
    /// The planner sees the command's locations and those of every stock row
    /// of the item. Returns the written changeset; a no-op changeset writes nothing.
    async fn execute(
        &self,
        item_id: ItemId,
        command: &StockCommand,
        ctx: &OperationContext,
    ) -> Result<Changeset, StoreError>;

    async fn query_ledger(
        &self,
        tenant_id: TenantId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerRow>, StoreError>;

    async fn transfers_for_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Vec<TransferRecord>, StoreError>;

    /// Delete the given entries; returns how many existed.
    async fn delete_entries(&self, tenant_id: TenantId, ids: &[EntryId]) -> Result<u64, StoreError>;

    /// Delete every ledger entry of the tenant.
    async fn clear_ledger(&self, tenant_id: TenantId) -> Result<u64, StoreError>;

    async fn users_with_roles(&self, tenant_id: TenantId, roles: &[String]) -> Result<Vec<User>, StoreError>;

    /// Insert alerts, skipping any that duplicate an unread notification.
    ///
    /// The duplicate check and the insert are one atomic step. Returns the
    /// notifications that were actually inserted.
    async fn insert_alerts(&self, alerts: Vec<Notification>) -> Result<Vec<Notification>, StoreError>;

    /// Notifications of one user, newest first.
    async fn notifications_for(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Returns false when the notification does not exist.
    async fn mark_notification_read(
        &self,
        tenant_id: TenantId,
        notification_id: NotificationId,
    ) -> Result<bool, StoreError>;

    /// Items that have at least one stock row.
    async fn items_with_stock(&self, tenant_id: TenantId) -> Result<Vec<ItemId>, StoreError>;

    async fn stock_totals(&self, tenant_id: TenantId) -> Result<StockTotals, StoreError>;

    /// Items whose quantity is at or below their low threshold, lowest
    /// quantity first, then by name.
    async fn low_stock_items(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Item>, StoreError>;

    /// Entry counts grouped by kind and reason for entries created at or after `since`.
    async fn ledger_activity(
        &self,
        tenant_id: TenantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityRow>, StoreError>;
}
