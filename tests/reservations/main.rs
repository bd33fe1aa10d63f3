//! End-to-end optimistic mutation flows for a reservations screen.

mod api;
mod models;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api::{Reply, ScriptedApi};
use models::{Client, Reservation};
use optimistic_rust::{
    patch, CollectionState, CoordinatorConfig, ErrorKind, MutationError, MutationKind,
    MutationRequest, MutationResolution, MutationState, OptimisticCollection,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn reservations(initial: Vec<Reservation>) -> OptimisticCollection<Reservation> {
    init_tracing();
    let collection = OptimisticCollection::new(
        CoordinatorConfig::default().with_timeout(Duration::from_secs(5)),
    );
    collection.replace_all(initial).unwrap();
    collection
}

fn ids(collection: &OptimisticCollection<Reservation>) -> Vec<String> {
    collection
        .snapshot()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

#[tokio::test]
async fn failed_create_leaves_no_trace() {
    let collection = reservations(vec![]);
    let api = ScriptedApi::new(vec![Reply::Fail("court already booked")]);

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let _sub = collection
        .subscribe(
            |state: &CollectionState<Reservation>| state.contains("r1"),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

    let err = collection
        .dispatch(&api, MutationRequest::create(Reservation::new("r1", "1", "c1")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(collection.get("r1").unwrap(), None);
    assert_eq!(notified.load(Ordering::SeqCst), 2);
    assert_eq!(collection.pending_len().unwrap(), 0);
}

#[tokio::test]
async fn approval_commits_and_late_duplicate_is_stale() {
    let clients: OptimisticCollection<Client> = OptimisticCollection::default();
    clients
        .replace_all(vec![Client::new("c1", "Ana"), Client::new("c2", "Luis")])
        .unwrap();
    let api = ScriptedApi::new(vec![Reply::Ok]);

    let id = clients
        .dispatch(&api, MutationRequest::update("c1", patch! { "status" => "approved" }))
        .await
        .unwrap();

    assert_eq!(clients.get("c1").unwrap().unwrap().status, "approved");
    assert_eq!(clients.state_of(&id).unwrap(), Some(MutationState::Committed));

    let revision = clients.read(|state| state.revision()).unwrap();
    let err = clients
        .resolve(&MutationResolution::success(id.clone()))
        .unwrap_err();
    assert_eq!(
        err,
        MutationError::StaleMutation {
            mutation_id: id,
            state: Some(MutationState::Committed),
        }
    );
    assert_eq!(clients.read(|state| state.revision()).unwrap(), revision);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out_and_restores() {
    let collection = reservations(vec![Reservation::new("r1", "1", "c1")]);
    let api = ScriptedApi::new(vec![Reply::Hang]);

    let err = collection
        .dispatch(&api, MutationRequest::update("r1", patch! { "court" => "3" }))
        .await
        .unwrap_err();

    assert!(matches!(err, MutationError::Timeout { after, .. } if after == Duration::from_secs(5)));
    assert_eq!(collection.get("r1").unwrap().unwrap().court, "1");
    assert_eq!(api.call_count(), 1);
}

#[tokio::test]
async fn failed_delete_restores_original_position() {
    let collection = reservations(vec![
        Reservation::new("r1", "1", "c1"),
        Reservation::new("r2", "2", "c1"),
        Reservation::new("r3", "3", "c2"),
    ]);
    let api = ScriptedApi::new(vec![Reply::Fail("reservation already paid")]);

    let err = collection
        .dispatch(&api, MutationRequest::delete("r2"))
        .await
        .unwrap_err();

    assert!(matches!(err, MutationError::Rejected { .. }));
    assert_eq!(ids(&collection), vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn creates_land_where_requested() {
    let collection = reservations(vec![Reservation::new("r1", "1", "c1")]);
    let api = ScriptedApi::new(vec![]);

    collection
        .dispatch(&api, MutationRequest::create(Reservation::new("r0", "2", "c1")))
        .await
        .unwrap();
    collection
        .dispatch(
            &api,
            MutationRequest::create(Reservation::new("r9", "2", "c1"))
                .at(optimistic_rust::Position::End),
        )
        .await
        .unwrap();

    assert_eq!(ids(&collection), vec!["r0", "r1", "r9"]);
}

#[tokio::test]
async fn subscribers_only_hear_about_their_slice() {
    let collection = reservations(vec![
        Reservation::new("r1", "1", "c1"),
        Reservation::new("r2", "2", "c2"),
    ]);
    let api = ScriptedApi::new(vec![]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let _sub = collection
        .subscribe(
            |state: &CollectionState<Reservation>| {
                state.get("r1").map(|r| r.status.clone())
            },
            move |status: &Option<String>| log.lock().unwrap().push(status.clone()),
        )
        .unwrap();

    collection
        .dispatch(&api, MutationRequest::update("r2", patch! { "status" => "paid" }))
        .await
        .unwrap();
    assert!(seen.lock().unwrap().is_empty());

    collection
        .dispatch(&api, MutationRequest::update("r1", patch! { "status" => "paid" }))
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![Some("paid".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn queued_updates_apply_in_arrival_order() {
    let collection = reservations(vec![Reservation::new("r1", "1", "c1")]);
    let api = Arc::new(ScriptedApi::new(vec![
        Reply::Slow(Duration::from_millis(300)),
        Reply::Slow(Duration::from_millis(10)),
    ]));

    let first = {
        let collection = collection.clone();
        let api = Arc::clone(&api);
        tokio::spawn(async move {
            collection
                .dispatch_queued(&*api, MutationRequest::update("r1", patch! { "court" => "2" }))
                .await
        })
    };
    while api.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    let second = {
        let collection = collection.clone();
        let api = Arc::clone(&api);
        tokio::spawn(async move {
            collection
                .dispatch_queued(&*api, MutationRequest::update("r1", patch! { "court" => "4" }))
                .await
        })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(collection.get("r1").unwrap().unwrap().court, "4");
    assert_eq!(
        *api.calls.lock().unwrap(),
        vec![
            (MutationKind::Update, "r1".to_string()),
            (MutationKind::Update, "r1".to_string()),
        ]
    );
}

#[tokio::test]
async fn second_mutation_on_busy_target_is_refused() {
    let collection = reservations(vec![Reservation::new("r1", "1", "c1")]);
    let pending = collection
        .begin(MutationRequest::update("r1", patch! { "status" => "cancelled" }))
        .unwrap();

    let api = ScriptedApi::new(vec![]);
    let err = collection
        .dispatch(&api, MutationRequest::delete("r1"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MutationError::ConcurrentMutation {
            collection: "reservations",
            target_id: "r1".into(),
            pending: pending.clone(),
        }
    );
    assert_eq!(api.call_count(), 0);

    collection
        .resolve(&MutationResolution::failure(pending, Some(ErrorKind::Internal)))
        .unwrap();
    assert_eq!(collection.get("r1").unwrap().unwrap().status, "pending");
}
