use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_core::{EntryId, ItemId, LocationId, NotificationId, TenantId, UserId};
use stockroom_inventory::{
    EntryKind, Item, ItemStock, LedgerEntry, Location, Notification, StockCommand, StockError, StockLevel,
    TransferRecord, User,
};

use super::StockStore;
use crate::error::StoreError;
use crate::ledger::{ActivityRow, LedgerFilter, LedgerRow, Page, Pagination, StockTotals};
use crate::unit_of_work::{Changeset, OperationContext, plan};

#[derive(Debug, Default, Clone)]
struct Tables {
    items: HashMap<(TenantId, ItemId), Item>,
    locations: HashMap<(TenantId, LocationId), Location>,
    users: HashMap<(TenantId, UserId), User>,
    stocks: BTreeMap<(TenantId, ItemId, LocationId), i64>,
    ledger: Vec<LedgerEntry>,
    transfers: Vec<TransferRecord>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn levels(&self, tenant_id: TenantId, item_id: ItemId) -> Vec<(LocationId, i64)> {
        self.stocks
            .iter()
            .filter(|((t, i, _), _)| *t == tenant_id && *i == item_id)
            .map(|((_, _, location_id), qty)| (*location_id, *qty))
            .collect()
    }

    fn ledger_row(&self, entry: &LedgerEntry) -> LedgerRow {
        let tenant_id = entry.tenant_id;
        let item = self.items.get(&(tenant_id, entry.item_id));
        let location_name = |id: LocationId| {
            self.locations
                .get(&(tenant_id, id))
                .map(|l| l.name.clone())
                .unwrap_or_default()
        };
        LedgerRow {
            entry: entry.clone(),
            item_name: item.map(|i| i.name.clone()).unwrap_or_default(),
            item_sku: item.and_then(|i| i.sku.clone()),
            actor_name: self
                .users
                .get(&(tenant_id, entry.created_by))
                .map(|u| u.name.clone()),
            location_name: location_name(entry.location_id),
            from_location_name: entry.from_location_id.map(location_name),
        }
    }
}

/// In-memory stock store.
///
/// Intended for tests/dev. Each unit of work runs under one write lock against
/// a staged copy of the tables that replaces the live copy only on success.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    tables: RwLock<Tables>,
    fail_next_write: AtomicBool,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next unit of work fail after its stock rows are staged but
    /// before its ledger entries are written.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Overwrite an item's recorded total without touching its stock rows.
    #[cfg(test)]
    pub(crate) fn corrupt_item_quantity(&self, tenant_id: TenantId, item_id: ItemId, quantity: i64) {
        if let Ok(mut tables) = self.tables.write() {
            if let Some(item) = tables.items.get_mut(&(tenant_id, item_id)) {
                item.quantity = quantity;
            }
        }
    }

    /// Overwrite one stock row without touching the item's recorded totals.
    #[cfg(test)]
    pub(crate) fn corrupt_stock_row(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        location_id: LocationId,
        quantity: i64,
    ) {
        if let Ok(mut tables) = self.tables.write() {
            tables.stocks.insert((tenant_id, item_id, location_id), quantity);
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn insert_item(&self, item: Item) -> Result<Item, StoreError> {
        let mut tables = self.write()?;
        if let Some(sku) = item.sku.as_deref() {
            let taken = tables
                .items
                .values()
                .any(|i| i.tenant_id == item.tenant_id && i.sku.as_deref() == Some(sku));
            if taken {
                return Err(StoreError::Duplicate(format!("sku {sku} already exists")));
            }
        }
        tables.items.insert((item.tenant_id, item.id), item.clone());
        Ok(item)
    }

    async fn insert_location(&self, location: Location) -> Result<Location, StoreError> {
        let mut tables = self.write()?;
        if location.is_default {
            let has_default = tables
                .locations
                .values()
                .any(|l| l.tenant_id == location.tenant_id && l.is_default);
            if has_default {
                return Err(StoreError::Duplicate(
                    "tenant already has a default location".to_string(),
                ));
            }
        }
        tables
            .locations
            .insert((location.tenant_id, location.id), location.clone());
        Ok(location)
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        tables.users.insert((user.tenant_id, user.id), user.clone());
        Ok(user)
    }

    async fn get_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.read()?.items.get(&(tenant_id, item_id)).cloned())
    }

    async fn get_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&(tenant_id, user_id)).cloned())
    }

    async fn item_stocks(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Vec<StockLevel>, StoreError> {
        let tables = self.read()?;
        let mut levels: Vec<StockLevel> = tables
            .levels(tenant_id, item_id)
            .into_iter()
            .map(|(location_id, quantity)| StockLevel {
                item_id,
                location_id,
                location_name: tables
                    .locations
                    .get(&(tenant_id, location_id))
                    .map(|l| l.name.clone())
                    .unwrap_or_default(),
                quantity,
            })
            .collect();
        levels.sort_by(|a, b| a.location_name.cmp(&b.location_name));
        Ok(levels)
    }

    async fn execute(
        &self,
        item_id: ItemId,
        command: &StockCommand,
        ctx: &OperationContext,
    ) -> Result<Changeset, StoreError> {
        let tenant_id = ctx.tenant_id;
        let mut tables = self.write()?;

        let item = tables
            .items
            .get(&(tenant_id, item_id))
            .cloned()
            .ok_or_else(|| StockError::NotFound(format!("item {item_id}")))?;
        let levels = tables.levels(tenant_id, item_id);
        let mut location_ids = command.locations();
        location_ids.extend(levels.iter().map(|(id, _)| *id));
        location_ids.sort();
        location_ids.dedup();
        let locations: Vec<Location> = location_ids
            .into_iter()
            .filter_map(|id| tables.locations.get(&(tenant_id, id)).cloned())
            .collect();
        let stock = ItemStock::load(item, levels, ctx.policy);

        let changes = plan(stock, command, ctx, &locations)?;
        if changes.is_noop() {
            return Ok(changes);
        }

        let mut staged = tables.clone();
        staged
            .items
            .insert((tenant_id, item_id), changes.item.clone());
        for (location_id, quantity) in &changes.stock_writes {
            staged
                .stocks
                .insert((tenant_id, item_id, *location_id), *quantity);
        }

        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }

        staged.ledger.extend(changes.entries.iter().cloned());
        staged.transfers.extend(changes.transfers.iter().cloned());
        staged
            .notifications
            .extend(changes.notifications.iter().cloned());

        *tables = staged;
        Ok(changes)
    }

    async fn query_ledger(
        &self,
        tenant_id: TenantId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerRow>, StoreError> {
        let tables = self.read()?;
        let mut rows: Vec<LedgerRow> = tables
            .ledger
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .map(|e| tables.ledger_row(e))
            .filter(|row| filter.matches(row))
            .collect();
        rows.sort_by(|a, b| {
            b.entry
                .created_at
                .cmp(&a.entry.created_at)
                .then(a.entry.id.cmp(&b.entry.id))
        });

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn transfers_for_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .transfers
            .iter()
            .filter(|t| t.tenant_id == tenant_id && t.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn delete_entries(&self, tenant_id: TenantId, ids: &[EntryId]) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let before = tables.ledger.len();
        tables
            .ledger
            .retain(|e| !(e.tenant_id == tenant_id && ids.contains(&e.id)));
        Ok((before - tables.ledger.len()) as u64)
    }

    async fn clear_ledger(&self, tenant_id: TenantId) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let before = tables.ledger.len();
        tables.ledger.retain(|e| e.tenant_id != tenant_id);
        Ok((before - tables.ledger.len()) as u64)
    }

    async fn users_with_roles(&self, tenant_id: TenantId, roles: &[String]) -> Result<Vec<User>, StoreError> {
        let tables = self.read()?;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id && roles.contains(&u.role))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn insert_alerts(&self, alerts: Vec<Notification>) -> Result<Vec<Notification>, StoreError> {
        let mut tables = self.write()?;
        let mut inserted = Vec::new();
        for alert in alerts {
            if tables.notifications.iter().any(|n| alert.duplicates(n)) {
                continue;
            }
            tables.notifications.push(alert.clone());
            inserted.push(alert);
        }
        Ok(inserted)
    }

    async fn notifications_for(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<Notification>, StoreError> {
        let tables = self.read()?;
        let mut found: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn mark_notification_read(
        &self,
        tenant_id: TenantId,
        notification_id: NotificationId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        match tables
            .notifications
            .iter_mut()
            .find(|n| n.tenant_id == tenant_id && n.id == notification_id)
        {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn items_with_stock(&self, tenant_id: TenantId) -> Result<Vec<ItemId>, StoreError> {
        let tables = self.read()?;
        let mut ids: Vec<ItemId> = tables
            .stocks
            .keys()
            .filter(|(t, _, _)| *t == tenant_id)
            .map(|(_, item_id, _)| *item_id)
            .collect();
        ids.dedup();
        Ok(ids)
    }

    async fn stock_totals(&self, tenant_id: TenantId) -> Result<StockTotals, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .items
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .fold(StockTotals::default(), |totals, item| StockTotals {
                total_quantity: totals.total_quantity.saturating_add(item.quantity),
                total_reserved: totals.total_reserved.saturating_add(item.reserved_quantity),
            }))
    }

    async fn low_stock_items(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Item>, StoreError> {
        let tables = self.read()?;
        let mut items: Vec<Item> = tables
            .items
            .values()
            .filter(|i| i.tenant_id == tenant_id && i.quantity <= i.low_stock_threshold)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn ledger_activity(
        &self,
        tenant_id: TenantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityRow>, StoreError> {
        let tables = self.read()?;
        let mut counts: BTreeMap<(&'static str, &str), (EntryKind, u64)> = BTreeMap::new();
        for entry in tables
            .ledger
            .iter()
            .filter(|e| e.tenant_id == tenant_id && e.created_at >= since)
        {
            counts
                .entry((entry.kind.as_str(), entry.reason.as_str()))
                .or_insert((entry.kind, 0))
                .1 += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((_, reason), (kind, entries))| ActivityRow {
                kind,
                reason: reason.to_string(),
                entries,
            })
            .collect())
    }
}
