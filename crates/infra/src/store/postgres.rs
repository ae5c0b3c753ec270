//! Postgres-backed stock store.
//!
//! Every unit of work runs in one transaction:
//! `begin; set lock_timeout; lock item; lock stock rows; plan; write; commit`.
//! The item row is locked first and stock rows follow in `location_id`
//! order, so two mutations of the same item serialise and never deadlock
//! against each other.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | `23505` | `Duplicate` | Duplicate SKU or second default location |
//! | Database | `55P03` | `Concurrency` | `lock_timeout` expired while waiting for a row lock |
//! | Database | `40001` | `Concurrency` | Serialization failure |
//! | Database | `40P01` | `Concurrency` | Deadlock detected |
//! | Database (other) | Any other | `Backend` | Constraint or syntax errors |
//! | PoolClosed / PoolTimedOut / Io / other | N/A | `Backend` | Connection failures |
//!
//! ## Thread Safety
//!
//! `PostgresStockStore` is `Send + Sync` and cheap to clone; all operations go
//! through the SQLx connection pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use stockroom_core::{EntryId, ItemId, LocationId, NotificationId, TenantId, TransferId, UserId};
use stockroom_inventory::{
    EntryKind, Item, ItemStock, LedgerEntry, Location, Notification, NotificationKind, StockCommand,
    StockError, StockLevel, TransferRecord, User,
};

use super::StockStore;
use crate::config::InventoryConfig;
use crate::error::StoreError;
use crate::ledger::{ActivityRow, LedgerFilter, LedgerRow, Page, Pagination, StockTotals};
use crate::unit_of_work::{Changeset, OperationContext, plan};

const MIGRATION: &str = include_str!("../../migrations/0001_stockroom.sql");

const ITEM_COLUMNS: &str = "tenant_id, id, name, sku, unit, quantity, reserved_quantity, \
     low_stock_threshold, critical_stock_threshold, zero_stock_since, updated_at";

const LEDGER_FROM: &str = " FROM ledger_entries e \
     LEFT JOIN items i ON i.tenant_id = e.tenant_id AND i.id = e.item_id \
     LEFT JOIN users u ON u.tenant_id = e.tenant_id AND u.id = e.created_by \
     LEFT JOIN locations l ON l.tenant_id = e.tenant_id AND l.id = e.location_id \
     LEFT JOIN locations fl ON fl.tenant_id = e.tenant_id AND fl.id = e.from_location_id";

/// Postgres-backed stock store.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout: InventoryConfig::default().lock_timeout,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Open a pool using `DATABASE_URL` and the pool settings from `config`.
    pub async fn connect(config: &InventoryConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("DATABASE_URL is not set".to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool).with_lock_timeout(config.lock_timeout))
    }

    /// Apply the bundled schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(tx)
    }

    async fn write_changeset(
        tx: &mut Transaction<'static, Postgres>,
        changes: &Changeset,
    ) -> Result<(), sqlx::Error> {
        let item = &changes.item;
        sqlx::query(
            r#"
            UPDATE items
            SET quantity = $3, reserved_quantity = $4, zero_stock_since = $5, updated_at = $6
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(item.tenant_id.as_uuid())
        .bind(item.id.as_uuid())
        .bind(item.quantity)
        .bind(item.reserved_quantity)
        .bind(item.zero_stock_since)
        .bind(item.updated_at)
        .execute(&mut **tx)
        .await?;

        for (location_id, quantity) in &changes.stock_writes {
            sqlx::query(
                r#"
                INSERT INTO stocks (tenant_id, item_id, location_id, quantity, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (tenant_id, item_id, location_id)
                DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(item.tenant_id.as_uuid())
            .bind(item.id.as_uuid())
            .bind(location_id.as_uuid())
            .bind(quantity)
            .bind(item.updated_at)
            .execute(&mut **tx)
            .await?;
        }

        for entry in &changes.entries {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries (
                    tenant_id, id, item_id, kind, change_amount, location_id,
                    from_location_id, reason, created_by, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(entry.tenant_id.as_uuid())
            .bind(entry.id.as_uuid())
            .bind(entry.item_id.as_uuid())
            .bind(entry.kind.as_str())
            .bind(entry.change_amount)
            .bind(entry.location_id.as_uuid())
            .bind(entry.from_location_id.map(|id| *id.as_uuid()))
            .bind(&entry.reason)
            .bind(entry.created_by.as_uuid())
            .bind(entry.created_at)
            .execute(&mut **tx)
            .await?;
        }

        for transfer in &changes.transfers {
            sqlx::query(
                r#"
                INSERT INTO transfers (
                    tenant_id, id, item_id, from_location_id, to_location_id,
                    quantity, comment, created_by, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(transfer.tenant_id.as_uuid())
            .bind(transfer.id.as_uuid())
            .bind(transfer.item_id.as_uuid())
            .bind(transfer.from_location_id.as_uuid())
            .bind(transfer.to_location_id.as_uuid())
            .bind(transfer.quantity)
            .bind(&transfer.comment)
            .bind(transfer.created_by.as_uuid())
            .bind(transfer.created_at)
            .execute(&mut **tx)
            .await?;
        }

        for notification in &changes.notifications {
            insert_notification(tx, notification).await?;
        }

        Ok(())
    }
}

async fn insert_notification(
    tx: &mut Transaction<'static, Postgres>,
    n: &Notification,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (
            tenant_id, id, user_id, title, message, kind, item_id, is_read, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (tenant_id, user_id, title, item_id)
            WHERE NOT is_read AND kind IN ('warning', 'error')
        DO NOTHING
        "#,
    )
    .bind(n.tenant_id.as_uuid())
    .bind(n.id.as_uuid())
    .bind(n.user_id.as_uuid())
    .bind(&n.title)
    .bind(&n.message)
    .bind(n.kind.as_str())
    .bind(n.item_id.map(|id| *id.as_uuid()))
    .bind(n.is_read)
    .bind(n.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

fn push_ledger_filter(qb: &mut QueryBuilder<'_, Postgres>, tenant_id: TenantId, filter: &LedgerFilter) {
    qb.push(" WHERE e.tenant_id = ").push_bind(*tenant_id.as_uuid());
    if let Some(kind) = filter.kind {
        qb.push(" AND e.kind = ").push_bind(kind.as_str());
    }
    if let Some(after) = filter.created_after {
        qb.push(" AND e.created_at >= ").push_bind(after);
    }
    if let Some(before) = filter.created_before {
        qb.push(" AND e.created_at <= ").push_bind(before);
    }
    if let Some(item_id) = filter.item_id {
        qb.push(" AND e.item_id = ").push_bind(*item_id.as_uuid());
    }
    if let Some(location_id) = filter.location_id {
        let id = *location_id.as_uuid();
        qb.push(" AND (e.location_id = ")
            .push_bind(id)
            .push(" OR e.from_location_id = ")
            .push_bind(id)
            .push(")");
    }
    if let Some(term) = filter.search_term() {
        let pattern = format!("%{}%", escape_like(&term));
        qb.push(" AND (i.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.sku ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR e.reason ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl StockStore for PostgresStockStore {
    #[instrument(skip(self, item), fields(tenant_id = %item.tenant_id, item_id = %item.id), err)]
    async fn insert_item(&self, item: Item) -> Result<Item, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (
                tenant_id, id, name, sku, unit, quantity, reserved_quantity,
                low_stock_threshold, critical_stock_threshold, zero_stock_since, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(item.tenant_id.as_uuid())
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.sku)
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(item.reserved_quantity)
        .bind(item.low_stock_threshold)
        .bind(item.critical_stock_threshold)
        .bind(item.zero_stock_since)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(item)
    }

    #[instrument(skip(self, location), fields(tenant_id = %location.tenant_id, location_id = %location.id), err)]
    async fn insert_location(&self, location: Location) -> Result<Location, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO locations (tenant_id, id, name, is_default, responsible_user_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(location.tenant_id.as_uuid())
        .bind(location.id.as_uuid())
        .bind(&location.name)
        .bind(location.is_default)
        .bind(location.responsible_user_id.map(|id| *id.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(location)
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        sqlx::query("INSERT INTO users (tenant_id, id, name, role) VALUES ($1, $2, $3, $4)")
            .bind(user.tenant_id.as_uuid())
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(&user.role)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(user)
    }

    async fn get_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?;
        Ok(row.map(|r| r.0))
    }

    async fn get_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT tenant_id, id, name, role FROM users WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user", e))?;
        Ok(row.map(|r| r.0))
    }

    async fn item_stocks(&self, tenant_id: TenantId, item_id: ItemId) -> Result<Vec<StockLevel>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.item_id, s.location_id, l.name AS location_name, s.quantity
            FROM stocks s
            JOIN locations l ON l.tenant_id = s.tenant_id AND l.id = s.location_id
            WHERE s.tenant_id = $1 AND s.item_id = $2
            ORDER BY l.name ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("item_stocks", e))?;

        rows.iter()
            .map(|row| {
                Ok(StockLevel {
                    item_id: ItemId::from_uuid(row.try_get("item_id")?),
                    location_id: LocationId::from_uuid(row.try_get("location_id")?),
                    location_name: row.try_get("location_name")?,
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("item_stocks", e))
    }

    #[instrument(
        skip(self, command, ctx),
        fields(
            tenant_id = %ctx.tenant_id,
            item_id = %item_id,
            command = command.name(),
            entries = tracing::field::Empty
        ),
        err
    )]
    async fn execute(
        &self,
        item_id: ItemId,
        command: &StockCommand,
        ctx: &OperationContext,
    ) -> Result<Changeset, StoreError> {
        let operation = command.name();
        let tenant_id = ctx.tenant_id;
        let mut tx = self.begin(operation).await?;

        let item = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .map(|r| r.0)
        .ok_or_else(|| StockError::NotFound(format!("item {item_id}")))?;

        let levels = sqlx::query(
            r#"
            SELECT location_id, quantity
            FROM stocks
            WHERE tenant_id = $1 AND item_id = $2
            ORDER BY location_id
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?
        .iter()
        .map(|row| {
            Ok((
                LocationId::from_uuid(row.try_get("location_id")?),
                row.try_get::<i64, _>("quantity")?,
            ))
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| map_sqlx_error(operation, e))?;

        let mut location_ids: Vec<Uuid> = command
            .locations()
            .iter()
            .chain(levels.iter().map(|(id, _)| id))
            .map(|id| *id.as_uuid())
            .collect();
        location_ids.sort();
        location_ids.dedup();
        let locations = if location_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as::<_, LocationRow>(
                r#"
                SELECT tenant_id, id, name, is_default, responsible_user_id
                FROM locations
                WHERE tenant_id = $1 AND id = ANY($2)
                "#,
            )
            .bind(tenant_id.as_uuid())
            .bind(location_ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?
            .into_iter()
            .map(|r| r.0)
            .collect()
        };

        let stock = ItemStock::load(item, levels, ctx.policy);
        let changes = plan(stock, command, ctx, &locations)?;
        if changes.is_noop() {
            return Ok(changes);
        }

        Self::write_changeset(&mut tx, &changes)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        Span::current().record("entries", changes.entries.len());
        Ok(changes)
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id), err)]
    async fn query_ledger(
        &self,
        tenant_id: TenantId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerRow>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(LEDGER_FROM);
        push_ledger_filter(&mut count, tenant_id, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_ledger", e))?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT e.tenant_id, e.id, e.item_id, e.kind, e.change_amount, e.location_id, \
             e.from_location_id, e.reason, e.created_by, e.created_at, \
             COALESCE(i.name, '') AS item_name, i.sku AS item_sku, u.name AS actor_name, \
             COALESCE(l.name, '') AS location_name, fl.name AS from_location_name",
        );
        select.push(LEDGER_FROM);
        push_ledger_filter(&mut select, tenant_id, filter);
        select
            .push(" ORDER BY e.created_at DESC, e.id ASC LIMIT ")
            .push_bind(i64::from(pagination.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(pagination.offset));

        let rows = select
            .build_query_as::<LedgerRowRecord>()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_ledger", e))?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.0).collect(),
            total.max(0) as u64,
            pagination,
        ))
    }

    async fn transfers_for_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT tenant_id, id, item_id, from_location_id, to_location_id,
                   quantity, comment, created_by, created_at
            FROM transfers
            WHERE tenant_id = $1 AND item_id = $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transfers_for_item", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self, ids), fields(tenant_id = %tenant_id, requested = ids.len()), err)]
    async fn delete_entries(&self, tenant_id: TenantId, ids: &[EntryId]) -> Result<u64, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query("DELETE FROM ledger_entries WHERE tenant_id = $1 AND id = ANY($2)")
            .bind(tenant_id.as_uuid())
            .bind(ids)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_entries", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn clear_ledger(&self, tenant_id: TenantId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM ledger_entries WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("clear_ledger", e))?;
        Ok(result.rows_affected())
    }

    async fn users_with_roles(&self, tenant_id: TenantId, roles: &[String]) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT tenant_id, id, name, role
            FROM users
            WHERE tenant_id = $1 AND role = ANY($2)
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(roles.to_vec())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("users_with_roles", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self, alerts), fields(candidates = alerts.len()), err)]
    async fn insert_alerts(&self, alerts: Vec<Notification>) -> Result<Vec<Notification>, StoreError> {
        let mut tx = self.begin("insert_alerts").await?;
        let mut inserted = Vec::with_capacity(alerts.len());
        for alert in alerts {
            let affected = insert_notification(&mut tx, &alert)
                .await
                .map_err(|e| map_sqlx_error("insert_alerts", e))?;
            if affected > 0 {
                inserted.push(alert);
            }
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_alerts", e))?;
        Ok(inserted)
    }

    async fn notifications_for(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT tenant_id, id, user_id, title, message, kind, item_id, is_read, created_at
            FROM notifications
            WHERE tenant_id = $1 AND user_id = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("notifications_for", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn mark_notification_read(
        &self,
        tenant_id: TenantId,
        notification_id: NotificationId,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(notification_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_notification_read", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn items_with_stock(&self, tenant_id: TenantId) -> Result<Vec<ItemId>, StoreError> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT DISTINCT item_id FROM stocks WHERE tenant_id = $1 ORDER BY item_id")
                .bind(tenant_id.as_uuid())
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("items_with_stock", e))?;
        Ok(ids.into_iter().map(ItemId::from_uuid).collect())
    }

    async fn stock_totals(&self, tenant_id: TenantId) -> Result<StockTotals, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT AS total_quantity,
                   COALESCE(SUM(reserved_quantity), 0)::BIGINT AS total_reserved
            FROM items
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_totals", e))?;
        Ok(StockTotals {
            total_quantity: row
                .try_get("total_quantity")
                .map_err(|e| map_sqlx_error("stock_totals", e))?,
            total_reserved: row
                .try_get("total_reserved")
                .map_err(|e| map_sqlx_error("stock_totals", e))?,
        })
    }

    async fn low_stock_items(&self, tenant_id: TenantId, limit: u32) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE tenant_id = $1 AND quantity <= low_stock_threshold \
             ORDER BY quantity ASC, name ASC LIMIT $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("low_stock_items", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn ledger_activity(
        &self,
        tenant_id: TenantId,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActivityRow>, StoreError> {
        let rows = sqlx::query_as::<_, ActivityRecord>(
            r#"
            SELECT kind, reason, COUNT(*) AS entries
            FROM ledger_entries
            WHERE tenant_id = $1 AND created_at >= $2
            GROUP BY kind, reason
            ORDER BY kind, reason
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(since)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_activity", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

/// Map SQLx errors to store errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                // lock_timeout, serialization failure, deadlock
                Some("55P03") | Some("40001") | Some("40P01") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

struct ItemRow(Item);

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow(Item {
            id: ItemId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            unit: row.try_get("unit")?,
            quantity: row.try_get("quantity")?,
            reserved_quantity: row.try_get("reserved_quantity")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
            critical_stock_threshold: row.try_get("critical_stock_threshold")?,
            zero_stock_since: row.try_get("zero_stock_since")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

struct LocationRow(Location);

impl<'r> FromRow<'r, PgRow> for LocationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let responsible: Option<Uuid> = row.try_get("responsible_user_id")?;
        Ok(LocationRow(Location {
            id: LocationId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            name: row.try_get("name")?,
            is_default: row.try_get("is_default")?,
            responsible_user_id: responsible.map(UserId::from_uuid),
        }))
    }
}

struct UserRow(User);

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow(User {
            id: UserId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            name: row.try_get("name")?,
            role: row.try_get("role")?,
        }))
    }
}

struct TransferRow(TransferRecord);

impl<'r> FromRow<'r, PgRow> for TransferRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransferRow(TransferRecord {
            id: TransferId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            item_id: ItemId::from_uuid(row.try_get("item_id")?),
            from_location_id: LocationId::from_uuid(row.try_get("from_location_id")?),
            to_location_id: LocationId::from_uuid(row.try_get("to_location_id")?),
            quantity: row.try_get("quantity")?,
            comment: row.try_get("comment")?,
            created_by: UserId::from_uuid(row.try_get("created_by")?),
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct NotificationRow(Notification);

impl<'r> FromRow<'r, PgRow> for NotificationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let item_id: Option<Uuid> = row.try_get("item_id")?;
        Ok(NotificationRow(Notification {
            id: NotificationId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            kind: NotificationKind::parse(&kind)
                .ok_or_else(|| sqlx::Error::Decode(format!("unknown notification kind {kind:?}").into()))?,
            item_id: item_id.map(ItemId::from_uuid),
            is_read: row.try_get("is_read")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct ActivityRecord(ActivityRow);

impl<'r> FromRow<'r, PgRow> for ActivityRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let entries: i64 = row.try_get("entries")?;
        Ok(ActivityRecord(ActivityRow {
            kind: EntryKind::parse(&kind)
                .ok_or_else(|| sqlx::Error::Decode(format!("unknown entry kind {kind:?}").into()))?,
            reason: row.try_get("reason")?,
            entries: entries.max(0) as u64,
        }))
    }
}

struct LedgerRowRecord(LedgerRow);

impl<'r> FromRow<'r, PgRow> for LedgerRowRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let from_location_id: Option<Uuid> = row.try_get("from_location_id")?;
        let entry = LedgerEntry {
            id: EntryId::from_uuid(row.try_get("id")?),
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            item_id: ItemId::from_uuid(row.try_get("item_id")?),
            kind: EntryKind::parse(&kind)
                .ok_or_else(|| sqlx::Error::Decode(format!("unknown entry kind {kind:?}").into()))?,
            change_amount: row.try_get("change_amount")?,
            location_id: LocationId::from_uuid(row.try_get("location_id")?),
            from_location_id: from_location_id.map(LocationId::from_uuid),
            reason: row.try_get("reason")?,
            created_by: UserId::from_uuid(row.try_get("created_by")?),
            created_at: row.try_get("created_at")?,
        };
        Ok(LedgerRowRecord(LedgerRow {
            entry,
            item_name: row.try_get("item_name")?,
            item_sku: row.try_get("item_sku")?,
            actor_name: row.try_get("actor_name")?,
            location_name: row.try_get("location_name")?,
            from_location_name: row.try_get("from_location_name")?,
        }))
    }
}
