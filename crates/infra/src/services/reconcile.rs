//! Reconciler: rewrite item totals from their stock rows.

use tracing::{error, info, instrument, warn};

use stockroom_core::{ItemId, TenantId, UserId};
use stockroom_inventory::{Notification, StockCommand, StockEvent};

use super::{ThresholdMonitor, UnitRunner, require_role};
use crate::error::InventoryError;

/// One item whose recorded totals disagreed with its stock rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub item_id: ItemId,
    pub recorded: i64,
    pub actual: i64,
    pub reserved_recorded: i64,
    /// Reservation after the fix; capped so it never exceeds the corrected quantity.
    pub reserved: i64,
}

impl Drift {
    pub fn reservation_capped(&self) -> bool {
        self.reserved != self.reserved_recorded
    }
}

/// An item the run could not fix. The rest of the tenant is still processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileFailure {
    pub item_id: ItemId,
    pub error: InventoryError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Items with at least one stock row.
    pub checked: usize,
    pub corrected: Vec<Drift>,
    pub failed: Vec<ReconcileFailure>,
    pub alerts: Vec<Notification>,
}

#[derive(Clone)]
pub struct Reconciler {
    runner: UnitRunner,
    monitor: ThresholdMonitor,
    admin_role: String,
}

impl Reconciler {
    pub(crate) fn new(runner: UnitRunner, monitor: ThresholdMonitor, admin_role: String) -> Self {
        Self {
            runner,
            monitor,
            admin_role,
        }
    }

    /// Compare every item's total with the sum of its stock rows and correct
    /// any drift, one unit of work per item. Requires the admin role.
    ///
    /// An item that fails is recorded in [`ReconcileReport::failed`] and the
    /// run moves on to the next one.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, actor = %actor), err)]
    pub async fn reconcile(&self, tenant_id: TenantId, actor: UserId) -> Result<ReconcileReport, InventoryError> {
        require_role(self.runner.store(), tenant_id, actor, &self.admin_role).await?;

        let item_ids = self.runner.store().items_with_stock(tenant_id).await?;
        let mut report = ReconcileReport {
            checked: item_ids.len(),
            ..Default::default()
        };

        for item_id in item_ids {
            let ctx = self.runner.context(tenant_id).by(actor);
            let now = ctx.now;
            let changes = match self.runner.run(item_id, StockCommand::Reconcile, ctx).await {
                Ok(changes) => changes,
                Err(err) => {
                    warn!(
                        tenant_id = %tenant_id,
                        item_id = %item_id,
                        error = %err,
                        "item could not be reconciled"
                    );
                    report.failed.push(ReconcileFailure { item_id, error: err });
                    continue;
                }
            };

            for event in &changes.events {
                if let StockEvent::Reconciled {
                    recorded,
                    actual,
                    reserved_recorded,
                    reserved,
                } = event
                {
                    let drift = Drift {
                        item_id,
                        recorded: *recorded,
                        actual: *actual,
                        reserved_recorded: *reserved_recorded,
                        reserved: *reserved,
                    };
                    if recorded != actual {
                        error!(
                            tenant_id = %tenant_id,
                            item_id = %item_id,
                            recorded,
                            actual,
                            "item quantity drifted from stock rows"
                        );
                    }
                    if drift.reservation_capped() {
                        error!(
                            tenant_id = %tenant_id,
                            item_id = %item_id,
                            reserved_recorded,
                            reserved,
                            "reservation exceeded corrected quantity and was capped"
                        );
                    }
                    report.corrected.push(drift);
                }
            }

            if changes.changes_quantity() {
                let alerts = self.monitor.after_commit(&changes.item, now).await;
                report.alerts.extend(alerts);
            }
        }

        info!(
            target: "stockroom::audit",
            tenant_id = %tenant_id,
            actor = %actor,
            checked = report.checked,
            corrected = report.corrected.len(),
            failed = report.failed.len(),
            "reconciliation finished"
        );
        Ok(report)
    }
}
