//! Transfer coordinator: atomic moves between locations.
//!
//! Single moves and consolidation of every row of an item into one location.

use tracing::{Span, info, instrument};

use stockroom_core::{ItemId, LocationId, TenantId, UserId, ensure_positive};
use stockroom_inventory::{StockCommand, TransferRecord};

use super::{ThresholdMonitor, UnitRunner};
use crate::error::InventoryError;

#[derive(Clone)]
pub struct TransferCoordinator {
    runner: UnitRunner,
    monitor: ThresholdMonitor,
}

impl TransferCoordinator {
    pub(crate) fn new(runner: UnitRunner, monitor: ThresholdMonitor) -> Self {
        Self { runner, monitor }
    }

    /// Move `amount` units of one item from `from` to `to`.
    ///
    /// Both stock rows, the paired ledger entries, the transfer summary and the
    /// responsible users' notices are written in one unit of work. The item
    /// total does not change, so no stock alerts are evaluated.
    #[allow(clippy::too_many_arguments)]
    #[instrument(
        skip(self, comment),
        fields(tenant_id = %tenant_id, item_id = %item_id, from = %from, to = %to, actor = %actor),
        err
    )]
    pub async fn transfer(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        from: LocationId,
        to: LocationId,
        amount: i64,
        comment: Option<&str>,
        actor: UserId,
    ) -> Result<TransferRecord, InventoryError> {
        if from == to {
            return Err(InventoryError::InvalidLocation(
                "source and destination must differ".to_string(),
            ));
        }
        ensure_positive("amount", amount)?;

        let mut ctx = self.runner.context(tenant_id).by(actor);
        ctx.note = comment.map(str::to_string);

        let changes = self
            .runner
            .run(item_id, StockCommand::Transfer { from, to, amount }, ctx)
            .await?;

        let record = changes
            .transfers
            .into_iter()
            .next()
            .ok_or_else(|| InventoryError::Storage("transfer recorded no summary".to_string()))?;
        info!(transfer_id = %record.id, "stock transferred");

        self.monitor.deliver(&changes.notifications).await;
        Ok(record)
    }

    /// Move the whole stock of every other row of an item into `to`.
    ///
    /// One unit of work covers all source rows; each non-empty source gets a
    /// paired entry set and its own transfer summary. Rows at zero or below
    /// are left alone. Returns the summaries, empty when nothing had to move.
    #[instrument(
        skip(self, comment),
        fields(tenant_id = %tenant_id, item_id = %item_id, to = %to, actor = %actor, moved = tracing::field::Empty),
        err
    )]
    pub async fn consolidate(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        to: LocationId,
        comment: Option<&str>,
        actor: UserId,
    ) -> Result<Vec<TransferRecord>, InventoryError> {
        let mut ctx = self.runner.context(tenant_id).by(actor);
        ctx.note = comment.map(str::to_string);

        let changes = self
            .runner
            .run(item_id, StockCommand::Consolidate { to }, ctx)
            .await?;

        let moved: i64 = changes.transfers.iter().map(|t| t.quantity).sum();
        Span::current().record("moved", moved);
        info!(sources = changes.transfers.len(), moved, "stock consolidated");

        self.monitor.deliver(&changes.notifications).await;
        Ok(changes.transfers)
    }
}
