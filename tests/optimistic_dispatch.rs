use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use gardenmap::actions::ObjectMove;
use gardenmap::canvas::Position;
use gardenmap::layers::{LayerId, LayerKind, LayerState};
use gardenmap::persistence::BackendCall;
use gardenmap::shapes::MapObject;
use gardenmap::{
    Action, ActionKind, MapState, MapStore, MemoryBackend, Notification, OptimisticDispatcher,
    PersistenceError, RemoteReconciler, SpawnedDispatcher,
};

struct Session {
    spawned: SpawnedDispatcher,
    backend: MemoryBackend,
    p1: MapObject,
    layer: LayerId,
}

async fn session(backend: MemoryBackend) -> Session {
    let layer = LayerId::new();
    let p1 = MapObject::planting(layer, 1, Position::new(10, 10));
    let state = MapState::new()
        .with_layer(layer, LayerState::new(LayerKind::Plants, "Plants"))
        .with_object(p1.clone());
    backend.seed([p1.clone()]).await;

    let (_remote_tx, remote_rx) = mpsc::channel(8);
    let spawned = OptimisticDispatcher::spawn(
        MapStore::init(state, 100),
        Arc::new(backend.clone()),
        RemoteReconciler::new("me"),
        remote_rx,
    );
    Session {
        spawned,
        backend,
        p1,
        layer,
    }
}

fn drain(spawned: &mut SpawnedDispatcher) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = spawned.notifications.try_recv() {
        out.push(n);
    }
    out
}

#[tokio::test]
async fn successful_dispatch_keeps_the_edit() {
    let mut s = session(MemoryBackend::new()).await;
    let handle = s.spawned.handle.clone();

    handle
        .dispatch(Action::move_objects([ObjectMove::new(s.p1.id, Position::new(50, 60))]))
        .unwrap();
    handle.flush().await.unwrap();

    let position = handle.state().object(s.p1.id).map(|o| o.position);
    assert_eq!(position, Some(Position::new(50, 60)));
    assert_eq!(
        s.backend.object(s.p1.id).await.map(|o| o.position),
        Some(Position::new(50, 60))
    );
    assert!(drain(&mut s.spawned).is_empty());
}

#[tokio::test]
async fn transient_failure_rolls_back_and_offers_retry() {
    let backend = MemoryBackend::new();
    let mut s = session(backend).await;
    s.backend
        .fail_next(PersistenceError::Network("connection reset".into()))
        .await;
    let handle = s.spawned.handle.clone();
    let action = Action::move_objects([ObjectMove::new(s.p1.id, Position::new(50, 60))]);

    handle.dispatch(action.clone()).unwrap();
    handle.flush().await.unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(
        snapshot.state.object(s.p1.id).map(|o| o.position),
        Some(Position::new(10, 10))
    );
    assert!(!snapshot.can_undo);
    assert_eq!(snapshot.history_len, 0);

    match drain(&mut s.spawned).as_slice() {
        [Notification::PersistFailed { kind, retry, .. }] => {
            assert_eq!(*kind, ActionKind::Move);
            assert_eq!(retry.as_ref(), Some(&action));
        }
        other => panic!("unexpected notifications: {other:?}"),
    }

    // retrying succeeds once the server is back
    handle.dispatch(action).unwrap();
    handle.flush().await.unwrap();
    assert_eq!(
        handle.state().object(s.p1.id).map(|o| o.position),
        Some(Position::new(50, 60))
    );
}

#[tokio::test(start_paused = true)]
async fn failed_entry_is_removed_below_later_edits() {
    let backend = MemoryBackend::with_latency(Duration::from_millis(50));
    let mut s = session(backend).await;
    let p2 = MapObject::planting(s.layer, 2, Position::new(0, 0));
    s.backend
        .fail_object(p2.id, PersistenceError::Server {
            status: 503,
            message: "unavailable".into(),
        })
        .await;
    let handle = s.spawned.handle.clone();

    handle.dispatch(Action::create([p2.clone()])).unwrap();
    handle
        .dispatch(Action::move_objects([ObjectMove::new(s.p1.id, Position::new(7, 7))]))
        .unwrap();
    handle.flush().await.unwrap();

    let snapshot = handle.snapshot();
    assert!(!snapshot.state.contains(p2.id));
    assert_eq!(
        snapshot.state.object(s.p1.id).map(|o| o.position),
        Some(Position::new(7, 7))
    );
    assert_eq!(snapshot.history_len, 1);
    assert_eq!(snapshot.cursor, 1);
    assert!(matches!(
        drain(&mut s.spawned).as_slice(),
        [Notification::PersistFailed {
            kind: ActionKind::Create,
            retry: Some(_),
            ..
        }]
    ));
}

#[tokio::test]
async fn undo_and_redo_issue_compensating_calls() {
    let mut s = session(MemoryBackend::new()).await;
    let handle = s.spawned.handle.clone();

    handle.dispatch(Action::delete([s.p1.id])).unwrap();
    handle.flush().await.unwrap();
    assert!(s.backend.object(s.p1.id).await.is_none());

    handle.undo().unwrap();
    handle.flush().await.unwrap();
    assert!(handle.state().contains(s.p1.id));
    assert_eq!(s.backend.object(s.p1.id).await, Some(s.p1.clone()));

    handle.redo().unwrap();
    handle.flush().await.unwrap();
    assert!(!handle.state().contains(s.p1.id));

    assert_eq!(
        s.backend.calls().await,
        vec![
            BackendCall::Delete(s.p1.id),
            BackendCall::Create(s.p1.id),
            BackendCall::Delete(s.p1.id),
        ]
    );
    assert_eq!(
        drain(&mut s.spawned),
        vec![
            Notification::Undone(ActionKind::Delete),
            Notification::Redone(ActionKind::Delete),
        ]
    );
}

#[tokio::test]
async fn compensation_failure_is_reported_without_touching_state() {
    let mut s = session(MemoryBackend::new()).await;
    let handle = s.spawned.handle.clone();

    handle
        .dispatch(Action::move_objects([ObjectMove::new(s.p1.id, Position::new(1, 2))]))
        .unwrap();
    handle.flush().await.unwrap();

    s.backend
        .fail_next(PersistenceError::Conflict(s.p1.id))
        .await;
    handle.undo().unwrap();
    handle.flush().await.unwrap();

    assert_eq!(
        handle.state().object(s.p1.id).map(|o| o.position),
        Some(Position::new(10, 10))
    );
    assert!(handle.snapshot().can_redo);
    assert!(matches!(
        drain(&mut s.spawned).as_slice(),
        [
            Notification::Undone(ActionKind::Move),
            Notification::CompensationFailed {
                kind: ActionKind::Move,
                ..
            }
        ]
    ));
}

#[tokio::test]
async fn deleting_what_the_server_lost_is_not_an_error() {
    let mut s = session(MemoryBackend::new()).await;
    s.backend
        .fail_next(PersistenceError::NotFound(s.p1.id))
        .await;
    let handle = s.spawned.handle.clone();

    handle.dispatch(Action::delete([s.p1.id])).unwrap();
    handle.flush().await.unwrap();

    assert!(!handle.state().contains(s.p1.id));
    assert!(handle.snapshot().can_undo);
    assert!(drain(&mut s.spawned).is_empty());
}

#[tokio::test]
async fn batch_failure_is_not_masked_by_a_missing_member() {
    let mut s = session(MemoryBackend::new()).await;
    let handle = s.spawned.handle.clone();
    let p2 = MapObject::planting(s.layer, 2, Position::new(0, 0));
    handle.dispatch(Action::create([p2.clone()])).unwrap();
    handle.flush().await.unwrap();

    s.backend
        .fail_object(s.p1.id, PersistenceError::NotFound(s.p1.id))
        .await;
    s.backend
        .fail_object(p2.id, PersistenceError::Network("timeout".into()))
        .await;
    handle.dispatch(Action::delete([s.p1.id, p2.id])).unwrap();
    handle.flush().await.unwrap();

    let state = handle.state();
    assert!(state.contains(s.p1.id));
    assert!(state.contains(p2.id));
    assert!(s.backend.object(p2.id).await.is_some());
    assert!(matches!(
        drain(&mut s.spawned).as_slice(),
        [Notification::PersistFailed {
            kind: ActionKind::Delete,
            retry: Some(_),
            ..
        }]
    ));
}
