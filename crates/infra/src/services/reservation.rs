//! Reservation manager: reserve, release and commit item quantity.

use tracing::{info, instrument};

use stockroom_core::{ItemId, LocationId, TenantId, UserId, ensure_positive};
use stockroom_inventory::{Item, LedgerEntry, Notification, StockCommand};

use super::{ThresholdMonitor, UnitRunner};
use crate::error::InventoryError;

/// Result of consuming a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub item: Item,
    /// The `out` entry recorded for the commit.
    pub entry: LedgerEntry,
    /// Stock alerts raised by the new quantity.
    pub alerts: Vec<Notification>,
}

#[derive(Clone)]
pub struct ReservationManager {
    runner: UnitRunner,
    monitor: ThresholdMonitor,
}

impl ReservationManager {
    pub(crate) fn new(runner: UnitRunner, monitor: ThresholdMonitor) -> Self {
        Self { runner, monitor }
    }

    /// Hold `amount` units of unreserved stock. No ledger entry is written.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    pub async fn reserve(&self, tenant_id: TenantId, item_id: ItemId, amount: i64) -> Result<Item, InventoryError> {
        ensure_positive("amount", amount)?;
        let changes = self
            .runner
            .run(item_id, StockCommand::Reserve { amount }, self.runner.context(tenant_id))
            .await?;
        Ok(changes.item)
    }

    /// Give back up to `amount` reserved units; the reservation floors at zero.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    pub async fn release(&self, tenant_id: TenantId, item_id: ItemId, amount: i64) -> Result<Item, InventoryError> {
        ensure_positive("amount", amount)?;
        let changes = self
            .runner
            .run(item_id, StockCommand::Release { amount }, self.runner.context(tenant_id))
            .await?;
        Ok(changes.item)
    }

    /// Consume `amount` units from `location_id`, drawing down the reservation.
    ///
    /// Writes one `out` entry and runs the threshold monitor.
    #[instrument(
        skip(self, reason),
        fields(tenant_id = %tenant_id, item_id = %item_id, location_id = %location_id, actor = %actor),
        err
    )]
    pub async fn commit(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        location_id: LocationId,
        amount: i64,
        actor: UserId,
        reason: Option<&str>,
    ) -> Result<CommitOutcome, InventoryError> {
        ensure_positive("amount", amount)?;
        let mut ctx = self.runner.context(tenant_id).by(actor);
        ctx.note = reason.map(str::to_string);
        let now = ctx.now;

        let changes = self
            .runner
            .run(item_id, StockCommand::Commit { location_id, amount }, ctx)
            .await?;

        let entry = changes
            .entries
            .into_iter()
            .next()
            .ok_or_else(|| InventoryError::Storage("commit recorded no ledger entry".to_string()))?;
        info!(quantity = changes.item.quantity, "reservation committed");

        let alerts = self.monitor.after_commit(&changes.item, now).await;
        Ok(CommitOutcome {
            item: changes.item,
            entry,
            alerts,
        })
    }
}
