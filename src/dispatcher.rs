//! Optimistic dispatcher - the single mutation loop of an editing session.
//!
//! The loop owns the `MapStore` and is the only place the state changes. It
//! multiplexes three inputs:
//! - commands from the UI (dispatch, undo, redo),
//! - results of persistence calls running as spawned tasks,
//! - raw collaboration frames, decoded and applied by the `RemoteReconciler`.
//!
//! Persistence calls never touch the state; they report back over a channel
//! and the loop settles them in order. Calls for the same history entry (a
//! dispatch and a later undo of it) run one after another so the server sees
//! them in order; calls for different entries run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::actions::Action;
use crate::document::MapState;
use crate::error::EditorError;
use crate::history::EntryId;
use crate::notification::Notification;
use crate::persistence::{PersistenceApi, PersistenceError};
use crate::store::{MapStore, PersistJob};
use crate::sync::RemoteReconciler;

/// Commands from the UI to the mutation loop
#[derive(Debug)]
pub enum EditorCommand {
    Dispatch(Action),
    Undo,
    Redo,
    /// Collaboration frame delivered in order with local commands
    Remote(Vec<u8>),
    /// Reply once no persistence call is outstanding
    Flush(oneshot::Sender<()>),
    /// Tear the store down and stop the loop
    Shutdown,
}

/// What the UI renders from
#[derive(Debug, Clone)]
pub struct EditorSnapshot {
    pub state: Arc<MapState>,
    pub can_undo: bool,
    pub can_redo: bool,
    /// Applied local entries
    pub cursor: usize,
    /// Local entries, redo tail included
    pub history_len: usize,
}

impl EditorSnapshot {
    fn of(store: &MapStore) -> Self {
        Self {
            state: Arc::new(store.state().clone()),
            can_undo: store.can_undo(),
            can_redo: store.can_redo(),
            cursor: store.history().undo_depth(),
            history_len: store.history().local_len(),
        }
    }
}

/// Cheap handle for sending commands and reading the published state
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    commands: mpsc::UnboundedSender<EditorCommand>,
    snapshot: watch::Receiver<EditorSnapshot>,
}

impl DispatcherHandle {
    pub fn dispatch(&self, action: Action) -> Result<(), EditorError> {
        self.send(EditorCommand::Dispatch(action))
    }

    pub fn undo(&self) -> Result<(), EditorError> {
        self.send(EditorCommand::Undo)
    }

    pub fn redo(&self) -> Result<(), EditorError> {
        self.send(EditorCommand::Redo)
    }

    /// Hand a raw collaboration frame to the loop, ordered after every
    /// command sent before it
    pub fn receive_remote(&self, frame: Vec<u8>) -> Result<(), EditorError> {
        self.send(EditorCommand::Remote(frame))
    }

    /// Wait until every command sent so far is handled and no server call
    /// is outstanding
    pub async fn flush(&self) -> Result<(), EditorError> {
        let (tx, rx) = oneshot::channel();
        self.send(EditorCommand::Flush(tx))?;
        rx.await.map_err(|_| EditorError::SessionClosed)
    }

    pub fn shutdown(&self) -> Result<(), EditorError> {
        self.send(EditorCommand::Shutdown)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> EditorSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> Arc<MapState> {
        Arc::clone(&self.snapshot.borrow().state)
    }

    /// Receiver that wakes on every published change
    pub fn subscribe(&self) -> watch::Receiver<EditorSnapshot> {
        self.snapshot.clone()
    }

    fn send(&self, cmd: EditorCommand) -> Result<(), EditorError> {
        self.commands
            .send(cmd)
            .map_err(|_| EditorError::SessionClosed)
    }
}

/// Everything `OptimisticDispatcher::spawn` hands back
pub struct SpawnedDispatcher {
    pub handle: DispatcherHandle,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
    pub task: JoinHandle<()>,
}

type Settled = (PersistJob, Result<(), PersistenceError>);

/// Server calls queued for one history entry
struct Lane {
    tail: JoinHandle<()>,
    pending: usize,
}

pub struct OptimisticDispatcher {
    store: MapStore,
    api: Arc<dyn PersistenceApi>,
    reconciler: RemoteReconciler,
    snapshot_tx: watch::Sender<EditorSnapshot>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    settled_tx: mpsc::UnboundedSender<Settled>,
    lanes: HashMap<EntryId, Lane>,
    in_flight: usize,
    flush_waiters: Vec<oneshot::Sender<()>>,
}

impl OptimisticDispatcher {
    /// Start the mutation loop on the current tokio runtime
    pub fn spawn(
        store: MapStore,
        api: Arc<dyn PersistenceApi>,
        reconciler: RemoteReconciler,
        remote: mpsc::Receiver<Vec<u8>>,
    ) -> SpawnedDispatcher {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(EditorSnapshot::of(&store));

        let dispatcher = Self {
            store,
            api,
            reconciler,
            snapshot_tx,
            notify_tx,
            settled_tx,
            lanes: HashMap::new(),
            in_flight: 0,
            flush_waiters: Vec::new(),
        };
        let task = tokio::spawn(dispatcher.run(command_rx, settled_rx, remote));

        SpawnedDispatcher {
            handle: DispatcherHandle {
                commands: command_tx,
                snapshot: snapshot_rx,
            },
            notifications: notify_rx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<EditorCommand>,
        mut settled: mpsc::UnboundedReceiver<Settled>,
        mut remote: mpsc::Receiver<Vec<u8>>,
    ) {
        let mut remote_open = true;

        loop {
            let changed = tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(EditorCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some((job, result)) = settled.recv() => self.handle_settled(job, result),
                frame = remote.recv(), if remote_open => match frame {
                    Some(bytes) => self.handle_remote(&bytes),
                    None => {
                        tracing::debug!("collaboration channel closed");
                        remote_open = false;
                        false
                    }
                },
            };

            if changed {
                self.snapshot_tx.send_replace(EditorSnapshot::of(&self.store));
            }
            self.forward_notifications();
        }

        if self.in_flight > 0 {
            tracing::debug!(in_flight = self.in_flight, "shutting down with server calls outstanding");
        }
        self.store.teardown();
        self.snapshot_tx.send_replace(EditorSnapshot::of(&self.store));
    }

    fn handle_command(&mut self, cmd: EditorCommand) -> bool {
        match cmd {
            EditorCommand::Dispatch(action) => {
                let job = self.store.dispatch(action);
                self.spawn_job(job);
                true
            }
            EditorCommand::Undo => match self.store.undo() {
                Some(job) => {
                    self.spawn_job(job);
                    true
                }
                None => false,
            },
            EditorCommand::Redo => match self.store.redo() {
                Some(job) => {
                    self.spawn_job(job);
                    true
                }
                None => false,
            },
            EditorCommand::Remote(bytes) => self.handle_remote(&bytes),
            EditorCommand::Flush(reply) => {
                if self.in_flight == 0 {
                    let _ = reply.send(());
                } else {
                    self.flush_waiters.push(reply);
                }
                false
            }
            EditorCommand::Shutdown => false,
        }
    }

    fn handle_remote(&mut self, bytes: &[u8]) -> bool {
        self.reconciler
            .on_remote_message(&mut self.store, bytes)
            .changed()
    }

    fn handle_settled(&mut self, job: PersistJob, result: Result<(), PersistenceError>) -> bool {
        if let Some(lane) = self.lanes.get_mut(&job.entry) {
            lane.pending -= 1;
            if lane.pending == 0 {
                self.lanes.remove(&job.entry);
            }
        }
        self.in_flight -= 1;

        let changed = self.store.settle(&job, result);

        if self.in_flight == 0 {
            for waiter in self.flush_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
        changed
    }

    /// Run a server call in the background, after any earlier call for the
    /// same entry
    fn spawn_job(&mut self, job: PersistJob) {
        let api = Arc::clone(&self.api);
        let settled = self.settled_tx.clone();
        let entry = job.entry;
        let (previous, pending) = match self.lanes.remove(&entry) {
            Some(lane) => (Some(lane.tail), lane.pending),
            None => (None, 0),
        };

        let tail = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let result = job.action.execute(api.as_ref()).await;
            let _ = settled.send((job, result));
        });

        self.lanes.insert(
            entry,
            Lane {
                tail,
                pending: pending + 1,
            },
        );
        self.in_flight += 1;
    }

    fn forward_notifications(&mut self) {
        for notification in self.store.drain_notifications() {
            if notification.is_error() {
                tracing::warn!(%notification, "editor notification");
            } else {
                tracing::info!(%notification, "editor notification");
            }
            let _ = self.notify_tx.send(notification);
        }
    }
}
