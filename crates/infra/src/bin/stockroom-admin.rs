//! Administrative entry point: apply the schema, reconcile a tenant or print
//! its warehouse figures.
//!
//! ```text
//! stockroom-admin migrate
//! stockroom-admin reconcile <tenant-id> <admin-user-id>
//! stockroom-admin stats <tenant-id>
//! ```

use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{info, warn};

use stockroom_core::{TenantId, UserId};
use stockroom_infra::{InventoryConfig, LogNotifier, PostgresStockStore, Stockroom};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockroom_observability::init();

    let config = InventoryConfig::from_env().context("loading configuration")?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    let store = PostgresStockStore::connect(&config)
        .await
        .context("connecting to postgres")?;

    match args.first().map(String::as_str) {
        Some("migrate") => {
            store.migrate().await.context("applying schema")?;
            info!("schema applied");
        }
        Some("reconcile") => {
            let (Some(tenant), Some(actor)) = (args.get(1), args.get(2)) else {
                bail!("usage: stockroom-admin reconcile <tenant-id> <admin-user-id>");
            };
            let tenant: TenantId = tenant.parse().context("parsing tenant id")?;
            let actor: UserId = actor.parse().context("parsing user id")?;

            let room = Stockroom::new(Arc::new(store), Arc::new(LogNotifier), config);
            let report = room.reconciler().reconcile(tenant, actor).await?;
            for failure in &report.failed {
                warn!(item_id = %failure.item_id, error = %failure.error, "item not reconciled");
            }
            info!(
                checked = report.checked,
                corrected = report.corrected.len(),
                failed = report.failed.len(),
                alerts = report.alerts.len(),
                "reconciliation complete"
            );
        }
        Some("stats") => {
            let Some(tenant) = args.get(1) else {
                bail!("usage: stockroom-admin stats <tenant-id>");
            };
            let tenant: TenantId = tenant.parse().context("parsing tenant id")?;

            let room = Stockroom::new(Arc::new(store), Arc::new(LogNotifier), config);
            let stats = room.ledger().warehouse_stats(tenant).await?;
            for item in &stats.low_stock {
                info!(
                    item = %item.name,
                    quantity = item.quantity,
                    threshold = item.low_stock_threshold,
                    "low stock"
                );
            }
            info!(
                total_quantity = stats.totals.total_quantity,
                total_reserved = stats.totals.total_reserved,
                low_stock = stats.low_stock.len(),
                receipts = stats.activity.receipts,
                usage = stats.activity.usage,
                write_offs = stats.activity.write_offs,
                transfers = stats.activity.transfers,
                since = %stats.activity_since,
                "warehouse stats"
            );
        }
        _ => bail!("usage: stockroom-admin <migrate | reconcile <tenant-id> <admin-user-id> | stats <tenant-id>>"),
    }

    Ok(())
}
