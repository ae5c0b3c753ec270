//! Stock adjuster: receipts, write-offs and count corrections.

use tracing::{info, instrument};

use stockroom_core::{ItemId, LocationId, TenantId, UserId, ensure_not_blank};
use stockroom_inventory::{Adjustment, Item, LedgerEntry, Notification, StockCommand};

use super::{ThresholdMonitor, UnitRunner};
use crate::error::InventoryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustOutcome {
    pub item: Item,
    /// `None` when a correction matched the current count.
    pub entry: Option<LedgerEntry>,
    pub alerts: Vec<Notification>,
}

#[derive(Clone)]
pub struct StockAdjuster {
    runner: UnitRunner,
    monitor: ThresholdMonitor,
}

impl StockAdjuster {
    pub(crate) fn new(runner: UnitRunner, monitor: ThresholdMonitor) -> Self {
        Self { runner, monitor }
    }

    /// Apply `adjustment` to the stock row at `location_id`.
    #[allow(clippy::too_many_arguments)]
    #[instrument(
        skip(self, reason),
        fields(tenant_id = %tenant_id, item_id = %item_id, location_id = %location_id, actor = %actor),
        err
    )]
    pub async fn adjust(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        location_id: LocationId,
        adjustment: Adjustment,
        reason: &str,
        actor: UserId,
    ) -> Result<AdjustOutcome, InventoryError> {
        let reason = ensure_not_blank("reason", reason)?;
        let ctx = self.runner.context(tenant_id).by(actor).with_note(reason);
        let now = ctx.now;

        let changes = self
            .runner
            .run(item_id, StockCommand::Adjust { location_id, adjustment }, ctx)
            .await?;

        if changes.is_noop() {
            return Ok(AdjustOutcome {
                item: changes.item,
                entry: None,
                alerts: Vec::new(),
            });
        }

        info!(
            ?adjustment,
            quantity = changes.item.quantity,
            "stock adjusted"
        );
        let alerts = self.monitor.after_commit(&changes.item, now).await;
        Ok(AdjustOutcome {
            item: changes.item,
            entry: changes.entries.into_iter().next(),
            alerts,
        })
    }
}
