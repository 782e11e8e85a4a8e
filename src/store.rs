//! The map store - sole owner of the map state and its history.
//!
//! All state transitions go through here and are synchronous: dispatch,
//! undo, redo, settlement of persistence results, and remote actions. The
//! store never performs I/O itself. Operations that need a server call return
//! a `PersistJob` which the dispatcher runs and hands back to `settle`.

use crate::actions::{Action, ActionKind};
use crate::document::MapState;
use crate::history::{EntryId, HistoryStack};
use crate::notification::Notification;
use crate::persistence::PersistenceError;

/// Which store operation produced a persistence job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    /// Forward call of a freshly dispatched action
    Dispatch,
    /// Compensating call issued by undo
    Undo,
    /// Forward call issued again by redo
    Redo,
}

/// A server call the store wants made
#[derive(Debug, Clone)]
pub struct PersistJob {
    pub entry: EntryId,
    pub origin: JobOrigin,
    pub action: Action,
}

impl PersistJob {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}

/// State container for one editing session
#[derive(Debug)]
pub struct MapStore {
    state: MapState,
    history: HistoryStack,
    notifications: Vec<Notification>,
    max_history: usize,
}

impl MapStore {
    /// Create the store at document load from the hydrated layers
    pub fn init(initial: MapState, max_history: usize) -> Self {
        tracing::debug!(objects = initial.object_count(), "map store initialized");
        Self {
            history: HistoryStack::new(initial.clone(), max_history),
            state: initial,
            notifications: Vec::new(),
            max_history,
        }
    }

    /// Reset everything when the editor closes
    pub fn teardown(&mut self) {
        self.state = MapState::new();
        self.history = HistoryStack::new(MapState::new(), self.max_history);
        self.notifications.clear();
        tracing::debug!("map store torn down");
    }

    pub fn state(&self) -> &MapState {
        &self.state
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Apply an action optimistically and record it
    pub fn dispatch(&mut self, action: Action) -> PersistJob {
        let next = action.apply(&self.state);
        let entry = self.history.push(action.clone());
        self.state = next;
        tracing::debug!(
            %entry,
            kind = %action.kind(),
            cursor = self.history.cursor(),
            "dispatched"
        );
        PersistJob {
            entry,
            origin: JobOrigin::Dispatch,
            action,
        }
    }

    /// Step back one local entry. Returns the compensating server call.
    ///
    /// The compensation is built from the state the undo lands on, not from
    /// the state at dispatch time: remote edits and rollbacks since then are
    /// part of it, so the server ends up where the local state does.
    pub fn undo(&mut self) -> Option<PersistJob> {
        let (entry, next) = self.history.preview_undo()?;
        let kind = entry.action.kind();
        let Some(compensation) = entry.action.reverse(&next) else {
            tracing::debug!(entry = %entry.id, %kind, "nothing left to undo");
            self.notify(Notification::CannotUndo(kind));
            return None;
        };
        let entry = entry.id;

        self.history.step_back();
        self.state = next;
        tracing::debug!(%entry, %kind, cursor = self.history.cursor(), "undone");
        self.notify(Notification::Undone(kind));

        Some(PersistJob {
            entry,
            origin: JobOrigin::Undo,
            action: compensation,
        })
    }

    /// Step forward one entry. Returns the forward call to issue again.
    pub fn redo(&mut self) -> Option<PersistJob> {
        let entry = self.history.step_forward()?;
        let job = PersistJob {
            entry: entry.id,
            origin: JobOrigin::Redo,
            action: entry.action.clone(),
        };
        self.state = self.history.replay();
        tracing::debug!(entry = %job.entry, kind = %job.kind(), cursor = self.history.cursor(), "redone");
        self.notify(Notification::Redone(job.kind()));
        Some(job)
    }

    /// Handle the result of a server call. Returns whether the state changed.
    pub fn settle(&mut self, job: &PersistJob, result: Result<(), PersistenceError>) -> bool {
        let kind = job.kind();
        let error = match result {
            Ok(()) => {
                tracing::debug!(entry = %job.entry, %kind, origin = ?job.origin, "persisted");
                if job.origin == JobOrigin::Dispatch {
                    self.history.confirm(job.entry);
                }
                return false;
            }
            Err(error) => error,
        };

        match job.origin {
            JobOrigin::Dispatch if kind == ActionKind::Delete && error.is_not_found() => {
                tracing::debug!(entry = %job.entry, "already deleted on the server");
                self.history.confirm(job.entry);
                false
            }
            JobOrigin::Dispatch => {
                tracing::warn!(entry = %job.entry, %kind, %error, "persisting failed, rolling back");
                let changed = self.rollback(job.entry);
                let retry = error.is_transient().then(|| job.action.clone());
                self.notify(Notification::PersistFailed { kind, error, retry });
                changed
            }
            JobOrigin::Undo | JobOrigin::Redo if error.is_not_found() => {
                tracing::debug!(entry = %job.entry, %kind, "compensation target already gone");
                false
            }
            JobOrigin::Undo | JobOrigin::Redo => {
                tracing::warn!(entry = %job.entry, %kind, %error, origin = ?job.origin, "compensation failed");
                self.notify(Notification::CompensationFailed { kind, error });
                false
            }
        }
    }

    /// Remove a failed entry from the history and rebuild the state
    fn rollback(&mut self, entry: EntryId) -> bool {
        match self.history.remove(entry) {
            Some(true) => {
                self.state = self.history.replay();
                true
            }
            Some(false) => false,
            None => {
                tracing::debug!(%entry, "entry already gone from history");
                false
            }
        }
    }

    /// Apply an action already committed by another client.
    ///
    /// It is not undoable locally and not persisted again. It is logged at
    /// its arrival position so replays after an undo or a rollback keep it
    /// on top of the local edits that came before it.
    pub fn apply_remote(&mut self, action: &Action) {
        self.state = action.apply(&self.state);
        let entry = self.history.push_remote(action.clone());
        tracing::debug!(%entry, kind = %action.kind(), targets = action.targets().len(), "remote action applied");
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Take every notification emitted since the last drain
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}
