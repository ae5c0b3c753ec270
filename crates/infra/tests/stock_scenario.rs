use std::sync::Arc;

use proptest::prelude::*;
use stockroom_core::TenantId;
use stockroom_infra::{
    InMemoryStockStore, InventoryConfig, InventoryError, LedgerFilter, LogNotifier, Pagination,
    RecordingNotifier, StockStore, Stockroom,
};
use stockroom_inventory::{Adjustment, EntryKind, NewItem, NewLocation};

struct Warehouse {
    room: Stockroom,
    tenant: TenantId,
}

impl Warehouse {
    fn open(config: InventoryConfig) -> Self {
        stockroom_observability::init();
        let store = Arc::new(InMemoryStockStore::new());
        Self {
            room: Stockroom::new(store, Arc::new(LogNotifier), config),
            tenant: TenantId::new(),
        }
    }
}

#[tokio::test]
async fn t_shirt_moves_through_reserve_transfer_and_commit() {
    let w = Warehouse::open(InventoryConfig::default());
    let room = &w.room;

    let clerk = room.register_user(w.tenant, "Ilya", "warehouse").await.unwrap();
    let shirt = room
        .create_item(w.tenant, NewItem::named("T-Shirt").with_sku("TS-001"))
        .await
        .unwrap();
    let a = room
        .create_location(w.tenant, NewLocation::named("A").as_default())
        .await
        .unwrap();
    let b = room.create_location(w.tenant, NewLocation::named("B")).await.unwrap();

    room.adjuster()
        .adjust(w.tenant, shirt.id, a.id, Adjustment::In(50), "opening balance", clerk.id)
        .await
        .unwrap();
    room.reservations().reserve(w.tenant, shirt.id, 5).await.unwrap();
    room.transfers()
        .transfer(w.tenant, shirt.id, a.id, b.id, 20, Some("restock B"), clerk.id)
        .await
        .unwrap();
    let outcome = room
        .reservations()
        .commit(w.tenant, shirt.id, a.id, 5, clerk.id, None)
        .await
        .unwrap();

    assert_eq!(outcome.item.quantity, 45);
    assert_eq!(outcome.item.reserved_quantity, 0);
    assert!(outcome.alerts.is_empty());

    let stocks = room.ledger().item_stocks(w.tenant, shirt.id).await.unwrap();
    let by_name: Vec<(&str, i64)> = stocks
        .iter()
        .map(|s| (s.location_name.as_str(), s.quantity))
        .collect();
    assert_eq!(by_name, vec![("A", 25), ("B", 20)]);

    let history = room
        .ledger()
        .item_history(w.tenant, shirt.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(history.total, 4);
    let kinds: Vec<EntryKind> = history.items.iter().map(|r| r.entry.kind).collect();
    assert_eq!(kinds.iter().filter(|k| **k == EntryKind::Transfer).count(), 2);
    assert!(history.items.iter().all(|r| r.actor_name.as_deref() == Some("Ilya")));
    let transfer_reasons: Vec<&str> = history
        .items
        .iter()
        .filter(|r| r.entry.kind == EntryKind::Transfer)
        .map(|r| r.entry.reason.as_str())
        .collect();
    assert_eq!(
        transfer_reasons,
        vec![
            "Transfer from \"A\" to \"B\". Reason: restock B",
            "Transfer from \"A\" to \"B\". Reason: restock B"
        ]
    );
}

#[tokio::test]
async fn closing_a_shelf_consolidates_and_shows_in_the_stats() {
    let w = Warehouse::open(InventoryConfig::default());
    let room = &w.room;

    let clerk = room.register_user(w.tenant, "Ilya", "warehouse").await.unwrap();
    let cap = room.create_item(w.tenant, NewItem::named("Cap")).await.unwrap();
    let main = room
        .create_location(w.tenant, NewLocation::named("Main").as_default())
        .await
        .unwrap();
    let shelves = [
        room.create_location(w.tenant, NewLocation::named("Shelf 1")).await.unwrap(),
        room.create_location(w.tenant, NewLocation::named("Shelf 2")).await.unwrap(),
    ];
    for (shelf, amount) in shelves.iter().zip([4, 7]) {
        room.adjuster()
            .adjust(w.tenant, cap.id, shelf.id, Adjustment::In(amount), "delivery", clerk.id)
            .await
            .unwrap();
    }

    let records = room
        .transfers()
        .consolidate(w.tenant, cap.id, main.id, None, clerk.id)
        .await
        .unwrap();
    let mut moved: Vec<i64> = records.iter().map(|r| r.quantity).collect();
    moved.sort();
    assert_eq!(moved, vec![4, 7]);

    let stocks = room.ledger().item_stocks(w.tenant, cap.id).await.unwrap();
    let by_name: Vec<(&str, i64)> = stocks
        .iter()
        .map(|s| (s.location_name.as_str(), s.quantity))
        .collect();
    assert_eq!(by_name, vec![("Main", 11), ("Shelf 1", 0), ("Shelf 2", 0)]);

    let stats = room.ledger().warehouse_stats(w.tenant).await.unwrap();
    assert_eq!(stats.totals.total_quantity, 11);
    assert_eq!(stats.activity.receipts, 2);
    assert_eq!(stats.activity.transfers, 4);
    assert_eq!(stats.low_stock.len(), 0, "11 is above the default threshold");
}

#[tokio::test]
async fn tenants_are_isolated() {
    let w = Warehouse::open(InventoryConfig::default());
    let room = &w.room;
    let clerk = room.register_user(w.tenant, "Ilya", "warehouse").await.unwrap();
    let item = room.create_item(w.tenant, NewItem::named("Cap")).await.unwrap();
    let shelf = room
        .create_location(w.tenant, NewLocation::named("Shelf"))
        .await
        .unwrap();
    room.adjuster()
        .adjust(w.tenant, item.id, shelf.id, Adjustment::In(5), "delivery", clerk.id)
        .await
        .unwrap();

    let intruder = TenantId::new();
    let err = room.reservations().reserve(intruder, item.id, 1).await.unwrap_err();
    assert!(matches!(err, InventoryError::NotFound(_)));

    let page = room
        .ledger()
        .list_transactions(intruder, &LedgerFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn duplicate_sku_is_refused() {
    let w = Warehouse::open(InventoryConfig::default());
    w.room
        .create_item(w.tenant, NewItem::named("Cap").with_sku("CAP-1"))
        .await
        .unwrap();
    let err = w
        .room
        .create_item(w.tenant, NewItem::named("Cap v2").with_sku("CAP-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Validation(_)));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    })]

    /// Property: any sequence of transfers through the services leaves the
    /// item total and the sum of its stock rows unchanged.
    #[test]
    fn service_transfers_conserve_stock(
        moves in prop::collection::vec((0usize..3, 0usize..3, 1i64..30), 1..25)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let store = Arc::new(InMemoryStockStore::new());
            let notifier = Arc::new(RecordingNotifier::new());
            let room = Stockroom::new(store, notifier, InventoryConfig::default());
            let tenant = TenantId::new();
            let clerk = room.register_user(tenant, "Ilya", "warehouse").await.unwrap();
            let item = room.create_item(tenant, NewItem::named("Mug")).await.unwrap();

            let mut locations = Vec::new();
            for name in ["A", "B", "C"] {
                let location = room
                    .create_location(tenant, NewLocation::named(name))
                    .await
                    .unwrap();
                room.adjuster()
                    .adjust(tenant, item.id, location.id, Adjustment::In(20), "opening", clerk.id)
                    .await
                    .unwrap();
                locations.push(location.id);
            }

            for (from, to, amount) in moves {
                let _ = room
                    .transfers()
                    .transfer(tenant, item.id, locations[from], locations[to], amount, None, clerk.id)
                    .await;
            }

            let levels = room.ledger().item_stocks(tenant, item.id).await.unwrap();
            let sum: i64 = levels.iter().map(|s| s.quantity).sum();
            assert_eq!(sum, 60);
            assert!(levels.iter().all(|s| s.quantity >= 0));
            let item = room.store().get_item(tenant, item.id).await.unwrap().unwrap();
            assert_eq!(item.quantity, 60);
        });
    }
}
