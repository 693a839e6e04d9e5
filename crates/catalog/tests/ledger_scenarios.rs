use std::sync::Arc;
use std::thread;

use tally_catalog::{
    CatalogConfig, CatalogEvent, CatalogService, InMemoryWallets, ItemId, Payment,
};
use tally_core::{AggregateId, LedgerError, UserId};
use tally_events::{Event, EventEnvelope, InMemoryEventBus};

type Service = CatalogService<InMemoryWallets, InMemoryEventBus<EventEnvelope<CatalogEvent>>>;

fn service(admin: UserId) -> Service {
    tally_observability::init_with_filter("error");
    CatalogService::new(
        CatalogConfig::new(admin),
        InMemoryWallets::new(),
        InMemoryEventBus::new(),
    )
}

fn add_mug(svc: &Service, caller: UserId) -> ItemId {
    svc.add_item(caller, "Mug", "img/mug.png", "Ceramic mug", 10, 5, 2)
        .unwrap()
}

fn event_types(svc: &Service) -> Vec<&'static str> {
    svc.notifications()
        .unwrap()
        .iter()
        .map(|env| env.payload().event_type())
        .collect()
}

#[test]
fn mug_scenario_end_to_end() {
    let admin = UserId::new();
    let buyer = UserId::new();
    let svc = service(admin);
    svc.gateway().deposit(buyer, 100).unwrap();

    let mug = add_mug(&svc, admin);
    assert_eq!(mug, Service::derive_identifier("Mug"));

    let item = svc.get_item(mug).unwrap();
    assert_eq!(item.amount(), 10);
    assert!(!item.is_disabled());

    svc.buy(buyer, mug, 3, false, 15).unwrap();
    assert_eq!(svc.get_item(mug).unwrap().amount(), 7);
    assert_eq!(svc.balance().unwrap(), 15);
    assert_eq!(svc.get_points(buyer).unwrap(), 6);
    assert_eq!(svc.gateway().funds_of(buyer), 85);

    svc.buy(buyer, mug, 3, true, 0).unwrap();
    assert_eq!(svc.get_item(mug).unwrap().amount(), 4);
    assert_eq!(svc.get_points(buyer).unwrap(), 0);
    assert_eq!(svc.gateway().funds_of(buyer), 85);

    let journal_len = svc.notifications().unwrap().len();
    let err = svc.buy(buyer, mug, 1, true, 0).unwrap_err();
    assert_eq!(err, LedgerError::InsufficientPoints { available: 0, required: 2 });
    assert_eq!(svc.get_item(mug).unwrap().amount(), 4);
    assert_eq!(svc.notifications().unwrap().len(), journal_len);
}

#[test]
fn disabled_item_cannot_be_bought_until_reenabled() {
    let admin = UserId::new();
    let buyer = UserId::new();
    let svc = service(admin);
    svc.gateway().deposit(buyer, 50).unwrap();
    let mug = add_mug(&svc, admin);

    svc.disable_item(admin, mug).unwrap();
    assert_eq!(svc.buy(buyer, mug, 1, false, 5).unwrap_err(), LedgerError::Disabled(mug));

    svc.enable_item(admin, mug).unwrap();
    svc.buy(buyer, mug, 1, false, 5).unwrap();
    assert_eq!(svc.get_item(mug).unwrap().amount(), 9);
}

#[test]
fn unknown_users_have_zero_points() {
    let svc = service(UserId::new());
    assert_eq!(svc.get_points(UserId::new()).unwrap(), 0);
}

#[test]
fn get_item_of_unknown_identifier_is_not_found() {
    let svc = service(UserId::new());
    let ghost = ItemId::derive("Ghost");
    assert_eq!(svc.get_item(ghost).unwrap_err(), LedgerError::NotFound(ghost));
}

#[test]
fn withdraw_by_non_admin_fails_and_keeps_balance() {
    let admin = UserId::new();
    let buyer = UserId::new();
    let svc = service(admin);
    svc.gateway().deposit(buyer, 15).unwrap();
    let mug = add_mug(&svc, admin);
    svc.buy(buyer, mug, 3, false, 15).unwrap();

    assert_eq!(svc.withdraw(buyer).unwrap_err(), LedgerError::Unauthorized);
    assert_eq!(svc.balance().unwrap(), 15);
    assert_eq!(svc.gateway().funds_of(buyer), 0);
}

#[test]
fn withdraw_by_admin_pays_out_whole_balance() {
    let admin = UserId::new();
    let buyer = UserId::new();
    let svc = service(admin);
    svc.gateway().deposit(buyer, 25).unwrap();
    let mug = add_mug(&svc, admin);
    svc.buy(buyer, mug, 5, false, 25).unwrap();

    let withdrawn = svc.withdraw(admin).unwrap();
    assert_eq!(withdrawn, 25);
    assert_eq!(svc.balance().unwrap(), 0);
    assert_eq!(svc.gateway().funds_of(admin), 25);

    // Nothing left: a second withdrawal moves zero.
    assert_eq!(svc.withdraw(admin).unwrap(), 0);
    assert_eq!(svc.gateway().funds_of(admin), 25);
}

#[test]
fn failed_payout_rolls_back_withdrawal() {
    let admin = UserId::new();
    let buyer = UserId::new();
    let svc = service(admin);
    svc.gateway().deposit(buyer, 15).unwrap();
    let mug = add_mug(&svc, admin);
    svc.buy(buyer, mug, 3, false, 15).unwrap();
    let before = svc.notifications().unwrap().len();

    svc.gateway().reject_payouts_to(admin);
    let err = svc.withdraw(admin).unwrap_err();
    assert!(matches!(err, LedgerError::TransferFailed(_)));
    assert_eq!(svc.balance().unwrap(), 15);
    assert_eq!(svc.notifications().unwrap().len(), before);
}

#[test]
fn failed_payment_collection_aborts_purchase() {
    let admin = UserId::new();
    let buyer = UserId::new();
    let svc = service(admin);
    svc.gateway().deposit(buyer, 10).unwrap();
    let mug = add_mug(&svc, admin);

    let err = svc.buy(buyer, mug, 3, false, 15).unwrap_err();
    assert!(matches!(err, LedgerError::TransferFailed(_)));
    assert_eq!(svc.get_item(mug).unwrap().amount(), 10);
    assert_eq!(svc.balance().unwrap(), 0);
    assert_eq!(svc.get_points(buyer).unwrap(), 0);
    assert_eq!(svc.gateway().funds_of(buyer), 10);
}

#[test]
fn bad_payment_is_rejected_before_collection() {
    let admin = UserId::new();
    let buyer = UserId::new();
    let svc = service(admin);
    svc.gateway().deposit(buyer, 100).unwrap();
    let mug = add_mug(&svc, admin);

    let err = svc.buy(buyer, mug, 3, false, 20).unwrap_err();
    assert_eq!(err, LedgerError::BadPayment { expected: 15, paid: 20 });
    assert_eq!(svc.gateway().funds_of(buyer), 100);
}

#[test]
fn notifications_follow_commit_order() {
    let admin = UserId::new();
    let buyer = UserId::new();
    let svc = service(admin);
    svc.gateway().deposit(buyer, 5).unwrap();

    let mug = add_mug(&svc, admin);
    svc.edit_item(admin, mug, "img/mug2.png", "Bigger", 5, 2).unwrap();
    svc.restock_item(admin, mug, 5).unwrap();
    svc.disable_item(admin, mug).unwrap();
    assert!(svc.disable_item(admin, mug).is_err());
    svc.enable_item(admin, mug).unwrap();
    svc.buy(buyer, mug, 1, false, 5).unwrap();
    svc.withdraw(admin).unwrap();

    assert_eq!(
        event_types(&svc),
        vec![
            "catalog.item.added",
            "catalog.item.restocked",
            "catalog.item.edited",
            "catalog.item.restocked",
            "catalog.item.disabled",
            "catalog.item.enabled",
            "catalog.item.bought",
            "catalog.balance.withdrawn",
        ]
    );

    let journal = svc.notifications().unwrap();
    let sequences: Vec<u64> = journal.iter().map(|env| env.sequence_number()).collect();
    assert_eq!(sequences, (1..=8).collect::<Vec<_>>());
    assert!(journal.iter().all(|env| env.aggregate_id() == svc.id()));
    assert!(journal.iter().all(|env| env.aggregate_type() == "catalog"));
    let mut event_ids: Vec<_> = journal.iter().map(|env| env.event_id()).collect();
    event_ids.sort();
    event_ids.dedup();
    assert_eq!(event_ids.len(), journal.len());

    match journal[6].payload() {
        CatalogEvent::ItemBought(e) => {
            assert_eq!(e.item_id, mug);
            assert_eq!(e.amount, 1);
            assert_eq!(e.buyer, buyer);
            assert_eq!(e.payment, Payment::Currency { paid: 5, points_earned: 2 });
        }
        other => panic!("Expected ItemBought, got {other:?}"),
    }
}

#[test]
fn subscribers_receive_committed_notifications_only() {
    let admin = UserId::new();
    let svc = service(admin);
    let sub = svc.subscribe();

    let mug = add_mug(&svc, admin);
    assert!(svc.add_item(admin, "Mug", "", "", 1, 1, 1).is_err());
    svc.restock_item(admin, mug, 1).unwrap();

    let received = sub.drain();
    assert_eq!(received, svc.notifications().unwrap());
    assert_eq!(received.len(), 3);
}

#[test]
fn notifications_serialize_to_json() {
    let admin = UserId::new();
    let id = AggregateId::new();
    let svc: Service = CatalogService::with_id(
        id,
        CatalogConfig::new(admin),
        InMemoryWallets::new(),
        InMemoryEventBus::new(),
    );
    let mug = add_mug(&svc, admin);

    let journal = svc.notifications().unwrap();
    let json = serde_json::to_value(&journal[0]).unwrap();
    assert_eq!(json["aggregate_type"], "catalog");
    assert_eq!(json["sequence_number"], 1);
    assert_eq!(json["payload"]["ItemAdded"]["item_id"], mug.to_string());

    let back: EventEnvelope<CatalogEvent> = serde_json::from_value(json).unwrap();
    assert_eq!(back, journal[0]);
}

#[test]
fn concurrent_buyers_never_oversell() {
    let admin = UserId::new();
    let svc = Arc::new(service(admin));
    let mug = add_mug(&svc, admin);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                let buyer = UserId::new();
                svc.gateway().deposit(buyer, 100).unwrap();
                (0..5)
                    .filter(|_| svc.buy(buyer, mug, 1, false, 5).is_ok())
                    .count() as u64
            })
        })
        .collect();

    let sold: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(sold, 10);
    assert_eq!(svc.get_item(mug).unwrap().amount(), 0);
    assert_eq!(svc.balance().unwrap(), 50);
}
