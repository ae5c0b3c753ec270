//! Catalog-facing rows the stock ledger reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, ItemId, LocationId, TenantId, UserId, ensure_not_blank};

/// Display unit used when an item does not specify one.
pub const DEFAULT_UNIT: &str = "pcs";

/// Default low-stock boundary for new items.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Default critical-stock boundary for new items.
pub const DEFAULT_CRITICAL_STOCK_THRESHOLD: i64 = 0;

/// A trackable good with its aggregate quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub tenant_id: TenantId,
    pub name: String,
    pub sku: Option<String>,
    pub unit: String,
    /// Total physical count across all locations.
    pub quantity: i64,
    /// Portion of `quantity` provisionally allocated.
    pub reserved_quantity: i64,
    pub low_stock_threshold: i64,
    pub critical_stock_threshold: i64,
    /// Set when quantity first reaches zero or below, cleared once it recovers.
    pub zero_stock_since: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Quantity that can still be reserved or consumed without touching reservations.
    pub fn available(&self) -> i64 {
        self.quantity.saturating_sub(self.reserved_quantity)
    }

    /// Maintain `zero_stock_since` after a quantity change.
    pub fn track_zero_stock(&mut self, now: DateTime<Utc>) {
        if self.quantity <= 0 {
            if self.zero_stock_since.is_none() {
                self.zero_stock_since = Some(now);
            }
        } else {
            self.zero_stock_since = None;
        }
    }
}

/// Input for creating an item. Items always start with zero stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub sku: Option<String>,
    pub unit: Option<String>,
    pub low_stock_threshold: Option<i64>,
    pub critical_stock_threshold: Option<i64>,
}

impl NewItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sku: None,
            unit: None,
            low_stock_threshold: None,
            critical_stock_threshold: None,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_thresholds(mut self, low: i64, critical: i64) -> Self {
        self.low_stock_threshold = Some(low);
        self.critical_stock_threshold = Some(critical);
        self
    }

    /// Validate and materialize into an item row.
    pub fn into_item(self, tenant_id: TenantId, now: DateTime<Utc>) -> Result<Item, DomainError> {
        let name = ensure_not_blank("item name", &self.name)?.to_string();
        let sku = self
            .sku
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let unit = self
            .unit
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_UNIT.to_string());
        let low = self.low_stock_threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        let critical = self
            .critical_stock_threshold
            .unwrap_or(DEFAULT_CRITICAL_STOCK_THRESHOLD);

        if critical > low {
            return Err(DomainError::validation(format!(
                "critical threshold ({critical}) cannot exceed low threshold ({low})"
            )));
        }

        Ok(Item {
            id: ItemId::new(),
            tenant_id,
            name,
            sku,
            unit,
            quantity: 0,
            reserved_quantity: 0,
            low_stock_threshold: low,
            critical_stock_threshold: critical,
            zero_stock_since: Some(now),
            updated_at: now,
        })
    }
}

/// A physical storage place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub tenant_id: TenantId,
    pub name: String,
    pub is_default: bool,
    /// Owner of transfer notices for this location.
    pub responsible_user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub is_default: bool,
    pub responsible_user_id: Option<UserId>,
}

impl NewLocation {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            responsible_user_id: None,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn responsible(mut self, user_id: UserId) -> Self {
        self.responsible_user_id = Some(user_id);
        self
    }

    pub fn into_location(self, tenant_id: TenantId) -> Result<Location, DomainError> {
        let name = ensure_not_blank("location name", &self.name)?.to_string();
        Ok(Location {
            id: LocationId::new(),
            tenant_id,
            name,
            is_default: self.is_default,
            responsible_user_id: self.responsible_user_id,
        })
    }
}

/// Quantity of one item at one location, joined with the location name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub location_name: String,
    pub quantity: i64,
}

/// Directory row owned by the host's auth system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub role: String,
}

impl User {
    pub fn new(tenant_id: TenantId, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            tenant_id,
            name: name.into(),
            role: role.into(),
        }
    }
}
