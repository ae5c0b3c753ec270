//! Stock level classification.

use serde::{Deserialize, Serialize};

use crate::model::Item;
use crate::notification::NotificationKind;

/// Alert level derived from an item's quantity, in priority order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAlert {
    /// Quantity below zero. Data-integrity signal; surfaced, never clamped.
    Negative,
    Critical,
    Low,
}

impl StockAlert {
    /// Classify an item, or `None` when it sits above both thresholds.
    pub fn classify(item: &Item) -> Option<Self> {
        if item.quantity < 0 {
            Some(StockAlert::Negative)
        } else if item.quantity <= item.critical_stock_threshold {
            Some(StockAlert::Critical)
        } else if item.quantity <= item.low_stock_threshold {
            Some(StockAlert::Low)
        } else {
            None
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            StockAlert::Negative => "Negative stock",
            StockAlert::Critical => "Critical stock",
            StockAlert::Low => "Low stock",
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            StockAlert::Negative | StockAlert::Critical => NotificationKind::Error,
            StockAlert::Low => NotificationKind::Warning,
        }
    }

    pub fn message(&self, item: &Item) -> String {
        match self {
            StockAlert::Negative => format!(
                "{}: quantity is {} {}, check recent movements",
                item.name, item.quantity, item.unit
            ),
            StockAlert::Critical => format!(
                "{}: {} {} left (critical threshold {})",
                item.name, item.quantity, item.unit, item.critical_stock_threshold
            ),
            StockAlert::Low => format!(
                "{}: {} {} left (threshold {})",
                item.name, item.quantity, item.unit, item.low_stock_threshold
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewItem;
    use chrono::Utc;
    use stockroom_core::TenantId;

    fn item_with(quantity: i64, low: i64, critical: i64) -> Item {
        let mut item = NewItem::named("T-Shirt")
            .with_thresholds(low, critical)
            .into_item(TenantId::new(), Utc::now())
            .unwrap();
        item.quantity = quantity;
        item
    }

    #[test]
    fn classification_follows_priority_order() {
        assert_eq!(StockAlert::classify(&item_with(-1, 10, 0)), Some(StockAlert::Negative));
        assert_eq!(StockAlert::classify(&item_with(0, 10, 0)), Some(StockAlert::Critical));
        assert_eq!(StockAlert::classify(&item_with(3, 10, 3)), Some(StockAlert::Critical));
        assert_eq!(StockAlert::classify(&item_with(10, 10, 3)), Some(StockAlert::Low));
        assert_eq!(StockAlert::classify(&item_with(11, 10, 3)), None);
    }

    #[test]
    fn negative_and_critical_are_errors() {
        assert_eq!(StockAlert::Negative.kind(), NotificationKind::Error);
        assert_eq!(StockAlert::Critical.kind(), NotificationKind::Error);
        assert_eq!(StockAlert::Low.kind(), NotificationKind::Warning);
    }

    #[test]
    fn message_names_item_and_unit() {
        let item = item_with(8, 10, 0);
        assert_eq!(StockAlert::Low.message(&item), "T-Shirt: 8 pcs left (threshold 10)");
    }
}
