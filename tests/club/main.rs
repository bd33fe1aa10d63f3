//! Cross-store behaviour: change propagation, persistence, cached totals, and
//! logout.

mod models;

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use models::{LedgerEntry, Reservation};
use optimistic_rust::{
    patch, CacheLayer, ChangeEmitter, CollectionSnapshot, InMemoryPersistedStore, KeyPattern,
    ManualClock, MutationRequest, NamedCache, OptimisticCollection, PersistedStore, Session,
};

fn paid_total(reservations: &OptimisticCollection<Reservation>) -> i64 {
    reservations
        .read(|state| {
            state
                .filter(|r| r.paid)
                .into_iter()
                .map(|r| r.price_cents)
                .sum()
        })
        .unwrap()
}

#[test]
fn ledger_follows_paid_reservations() {
    let reservations = OptimisticCollection::<Reservation>::default();
    reservations
        .replace_all(vec![Reservation::new("r1", 2500), Reservation::new("r2", 3000)])
        .unwrap();
    let ledger = OptimisticCollection::<LedgerEntry>::default();

    let emitter = ChangeEmitter::new();
    let _attached = emitter.attach(&reservations).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let done_tx = Mutex::new(done_tx);
    let source = reservations.clone();
    let sink = ledger.clone();
    emitter.on("reservations", move |event| {
        let Some(id) = event.id else { return };
        let Some(reservation) = source.get(&id).unwrap() else { return };
        if reservation.paid {
            let entry = LedgerEntry {
                id: format!("l-{id}"),
                reservation_id: id,
                amount_cents: reservation.price_cents,
            };
            sink.replace_all({
                let mut entries = sink.snapshot().unwrap();
                entries.push(entry);
                entries
            })
            .unwrap();
        }
        done_tx.lock().unwrap().send(()).unwrap();
    });

    let id = reservations
        .begin(MutationRequest::update("r2", patch! { "paid" => true }))
        .unwrap();
    reservations.commit(&id).unwrap();

    done_rx.recv_timeout(Duration::from_secs(1)).unwrap();
    let entries = ledger.snapshot().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reservation_id, "r2");
    assert_eq!(entries[0].amount_cents, paid_total(&reservations));
}

#[test]
fn snapshot_survives_reload_as_text() {
    let reservations = OptimisticCollection::<Reservation>::default();
    reservations
        .replace_all(vec![Reservation::new("r2", 3000), Reservation::new("r1", 2500)])
        .unwrap();

    let persisted = InMemoryPersistedStore::new();
    reservations.persist(&persisted).unwrap();

    // A text-only backend stores the base64 form.
    let bytes = persisted.load("reservations").unwrap().unwrap();
    let text = CollectionSnapshot::<Reservation>::decode(&bytes)
        .unwrap()
        .to_base64()
        .unwrap();
    let restored = CollectionSnapshot::<Reservation>::from_base64(&text).unwrap();
    assert_eq!(restored.entities, reservations.snapshot().unwrap());

    let after_reload = OptimisticCollection::<Reservation>::default();
    assert!(after_reload.hydrate(&persisted).unwrap());
    assert_eq!(
        after_reload
            .snapshot()
            .unwrap()
            .iter()
            .map(|r| r.id.as_str())
            .collect::<Vec<_>>(),
        vec!["r2", "r1"]
    );
}

#[test]
fn cached_totals_are_invalidated_after_payment() {
    let reservations = OptimisticCollection::<Reservation>::default();
    reservations
        .replace_all(vec![Reservation::new("r1", 2500)])
        .unwrap();
    let clock = ManualClock::new();
    let totals: CacheLayer<i64> = CacheLayer::with_clock(clock.clone());
    let ttl = Duration::from_secs(30);

    assert_eq!(totals.get_or_insert_with("totals:2024-06-01", ttl, || paid_total(&reservations)), 0);

    let id = reservations
        .begin(MutationRequest::update("r1", patch! { "paid" => true }))
        .unwrap();
    reservations.commit(&id).unwrap();

    // Still the memoized value until invalidated.
    assert_eq!(totals.get("totals:2024-06-01"), Some(0));
    assert_eq!(totals.invalidate(Some(&KeyPattern::from("totals:"))), 1);
    assert_eq!(totals.get_or_insert_with("totals:2024-06-01", ttl, || paid_total(&reservations)), 2500);

    clock.advance(Duration::from_secs(31));
    assert_eq!(totals.get("totals:2024-06-01"), None);
}

#[test]
fn logout_resets_every_registered_store() {
    let reservations = OptimisticCollection::<Reservation>::default();
    reservations
        .replace_all(vec![Reservation::new("r1", 2500)])
        .unwrap();
    let ledger = OptimisticCollection::<LedgerEntry>::default();
    ledger
        .replace_all(vec![LedgerEntry {
            id: "l1".into(),
            reservation_id: "r1".into(),
            amount_cents: 2500,
        }])
        .unwrap();
    let totals: CacheLayer<i64> = CacheLayer::new();
    totals.set("totals:all", 2500, Duration::from_secs(60));

    let persisted = InMemoryPersistedStore::new();
    reservations.persist(&persisted).unwrap();
    ledger.persist(&persisted).unwrap();

    let mut session = Session::new().with_persisted(Arc::new(persisted.clone()));
    session
        .register(reservations.clone())
        .register(ledger.clone())
        .register(NamedCache::new("totals", totals.clone()));

    session.reset_all().unwrap();

    assert_eq!(reservations.len().unwrap(), 0);
    assert_eq!(ledger.len().unwrap(), 0);
    assert!(totals.is_empty());
    assert!(persisted.keys().unwrap().is_empty());
}
