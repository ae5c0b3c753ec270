//! Read side of the ledger and the warehouse reports, plus the privileged
//! history deletion.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use stockroom_core::{EntryId, ItemId, TenantId, UserId};
use stockroom_inventory::{Item, StockLevel};

use super::require_role;
use crate::error::InventoryError;
use crate::ledger::{
    ACTIVITY_WINDOW_DAYS, ActivitySummary, LOW_STOCK_LIST_LIMIT, LedgerFilter, LedgerRow, Page, Pagination,
    StockTotals, WarehouseStats, activity_window_start,
};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct LedgerQueries {
    store: SharedStore,
    admin_role: String,
}

impl LedgerQueries {
    pub(crate) fn new(store: SharedStore, admin_role: String) -> Self {
        Self { store, admin_role }
    }

    /// Entries matching `filter`, newest first.
    pub async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerRow>, InventoryError> {
        Ok(self.store.query_ledger(tenant_id, filter, pagination).await?)
    }

    pub async fn item_history(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        pagination: Pagination,
    ) -> Result<Page<LedgerRow>, InventoryError> {
        self.list_transactions(tenant_id, &LedgerFilter::for_item(item_id), pagination)
            .await
    }

    /// Per-location quantities of one item.
    pub async fn item_stocks(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Vec<StockLevel>, InventoryError> {
        if self.store.get_item(tenant_id, item_id).await?.is_none() {
            return Err(InventoryError::NotFound(format!("item {item_id}")));
        }
        Ok(self.store.item_stocks(tenant_id, item_id).await?)
    }

    /// Sum of quantity and reserved quantity over all of the tenant's items.
    pub async fn stock_totals(&self, tenant_id: TenantId) -> Result<StockTotals, InventoryError> {
        Ok(self.store.stock_totals(tenant_id).await?)
    }

    /// Items at or below their low-stock threshold, lowest quantity first.
    pub async fn low_stock_items(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Item>, InventoryError> {
        Ok(self
            .store
            .low_stock_items(tenant_id, limit.min(Pagination::MAX_LIMIT))
            .await?)
    }

    /// Entry counts by kind for entries created at or after `since`.
    pub async fn activity(&self, tenant_id: TenantId, since: DateTime<Utc>) -> Result<ActivitySummary, InventoryError> {
        let rows = self.store.ledger_activity(tenant_id, since).await?;
        Ok(ActivitySummary::from_rows(&rows))
    }

    /// Totals, the low-stock list and the activity of the last thirty days.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn warehouse_stats(&self, tenant_id: TenantId) -> Result<WarehouseStats, InventoryError> {
        let activity_since = activity_window_start(Utc::now(), ACTIVITY_WINDOW_DAYS);
        Ok(WarehouseStats {
            totals: self.stock_totals(tenant_id).await?,
            low_stock: self.low_stock_items(tenant_id, LOW_STOCK_LIST_LIMIT).await?,
            activity: self.activity(tenant_id, activity_since).await?,
            activity_since,
        })
    }

    /// Delete selected entries. Requires the admin role.
    #[instrument(skip(self, ids), fields(tenant_id = %tenant_id, actor = %actor), err)]
    pub async fn delete_transactions(
        &self,
        tenant_id: TenantId,
        actor: UserId,
        ids: &[EntryId],
    ) -> Result<u64, InventoryError> {
        let admin = require_role(&self.store, tenant_id, actor, &self.admin_role).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.delete_entries(tenant_id, ids).await?;
        info!(
            target: "stockroom::audit",
            tenant_id = %tenant_id,
            actor = %admin.id,
            actor_name = %admin.name,
            requested = ids.len(),
            deleted,
            "ledger entries deleted"
        );
        Ok(deleted)
    }

    /// Delete the tenant's whole ledger. Requires the admin role.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, actor = %actor), err)]
    pub async fn clear_history(&self, tenant_id: TenantId, actor: UserId) -> Result<u64, InventoryError> {
        let admin = require_role(&self.store, tenant_id, actor, &self.admin_role).await?;
        let deleted = self.store.clear_ledger(tenant_id).await?;
        info!(
            target: "stockroom::audit",
            tenant_id = %tenant_id,
            actor = %admin.id,
            actor_name = %admin.name,
            deleted,
            "ledger history cleared"
        );
        Ok(deleted)
    }
}
