//! Ledger query and reporting types.
//!
//! All queries are tenant-scoped and paginated by default.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{ItemId, LocationId};
use stockroom_inventory::{EntryKind, Item, LedgerEntry};

/// Pagination parameters for ledger queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Filter criteria for ledger queries. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub kind: Option<EntryKind>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub item_id: Option<ItemId>,
    /// Matches either side of a transfer.
    pub location_id: Option<LocationId>,
    /// Case-insensitive substring over item name, SKU, reason and actor name.
    pub search: Option<String>,
}

impl LedgerFilter {
    pub fn for_item(item_id: ItemId) -> Self {
        Self {
            item_id: Some(item_id),
            ..Default::default()
        }
    }

    /// Search term, trimmed and lowercased; `None` when blank.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Evaluate the filter against an already-joined row.
    pub fn matches(&self, row: &LedgerRow) -> bool {
        let entry = &row.entry;
        if self.kind.is_some_and(|kind| entry.kind != kind) {
            return false;
        }
        if self.created_after.is_some_and(|t| entry.created_at < t) {
            return false;
        }
        if self.created_before.is_some_and(|t| entry.created_at > t) {
            return false;
        }
        if self.item_id.is_some_and(|id| entry.item_id != id) {
            return false;
        }
        if let Some(location_id) = self.location_id {
            if entry.location_id != location_id && entry.from_location_id != Some(location_id) {
                return false;
            }
        }
        if let Some(term) = self.search_term() {
            let haystacks = [
                Some(row.item_name.as_str()),
                row.item_sku.as_deref(),
                Some(entry.reason.as_str()),
                row.actor_name.as_deref(),
            ];
            if !haystacks
                .into_iter()
                .flatten()
                .any(|h| h.to_lowercase().contains(&term))
            {
                return false;
            }
        }
        true
    }
}

/// A ledger entry joined with the names a reader needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub entry: LedgerEntry,
    pub item_name: String,
    pub item_sku: Option<String>,
    /// `None` when the actor is not in the user directory.
    pub actor_name: Option<String>,
    pub location_name: String,
    pub from_location_name: Option<String>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of rows matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}

/// Days covered by the activity breakdown in [`WarehouseStats`].
pub const ACTIVITY_WINDOW_DAYS: i64 = 30;

/// Most low-stock items listed in [`WarehouseStats`].
pub const LOW_STOCK_LIST_LIMIT: u32 = 20;

/// Reason fragments that mark an `out` entry as a write-off rather than usage.
const WRITE_OFF_MARKERS: [&str; 3] = ["write-off", "write off", "defect"];

/// Tenant-wide sums over item rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTotals {
    pub total_quantity: i64,
    pub total_reserved: i64,
}

/// Number of ledger entries sharing one kind and reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub kind: EntryKind,
    pub reason: String,
    pub entries: u64,
}

/// Ledger entry counts by kind, with `out` split into usage and write-offs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub receipts: u64,
    pub usage: u64,
    pub write_offs: u64,
    /// Transfer entries; each move records two.
    pub transfers: u64,
}

impl ActivitySummary {
    pub fn from_rows(rows: &[ActivityRow]) -> Self {
        let mut summary = Self::default();
        for row in rows {
            match row.kind {
                EntryKind::In => summary.receipts += row.entries,
                EntryKind::Transfer => summary.transfers += row.entries,
                EntryKind::Out if is_write_off(&row.reason) => summary.write_offs += row.entries,
                EntryKind::Out => summary.usage += row.entries,
            }
        }
        summary
    }
}

fn is_write_off(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    WRITE_OFF_MARKERS.iter().any(|marker| reason.contains(marker))
}

/// Start of the activity window: midnight UTC, `days` days before `now`.
pub fn activity_window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let start = now - Duration::days(days);
    start
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(start)
}

/// Warehouse dashboard figures for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStats {
    pub totals: StockTotals,
    /// Items at or below their low-stock threshold, lowest quantity first.
    pub low_stock: Vec<Item>,
    pub activity: ActivitySummary,
    pub activity_since: DateTime<Utc>,
}
