//! Collaboration input: actions committed by other users
//!
//! Other clients broadcast each action they persist as a `RemoteMessage`.
//! Those actions are already saved, so they are applied to the local state
//! only: no history entry, no server call. Echoes of our own edits are
//! skipped because they are already applied locally.

pub mod protocol;

use serde::{Deserialize, Serialize};

use crate::actions::{Action, ActionKind};
use crate::notification::Notification;
use crate::store::MapStore;

/// Wire format of one collaboration message (JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub user_id: String,
    pub action: Action,
}

impl RemoteMessage {
    pub fn new(user_id: impl Into<String>, action: Action) -> Self {
        Self {
            user_id: user_id.into(),
            action,
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// What happened to one incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Applied(ActionKind),
    /// Our own edit coming back
    SkippedOwn,
    /// Undecodable, reported and dropped
    Dropped,
}

impl RemoteOutcome {
    /// Whether the local state changed
    pub fn changed(self) -> bool {
        matches!(self, RemoteOutcome::Applied(_))
    }
}

/// Running totals, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteStats {
    pub applied: u64,
    pub skipped: u64,
    pub dropped: u64,
}

/// Feeds remote actions into the store on the mutation loop
#[derive(Debug, Clone)]
pub struct RemoteReconciler {
    current_user: String,
    stats: RemoteStats,
}

impl RemoteReconciler {
    pub fn new(current_user: impl Into<String>) -> Self {
        Self {
            current_user: current_user.into(),
            stats: RemoteStats::default(),
        }
    }

    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    pub fn stats(&self) -> RemoteStats {
        self.stats
    }

    /// Decode a raw frame and apply it
    pub fn on_remote_message(&mut self, store: &mut MapStore, bytes: &[u8]) -> RemoteOutcome {
        match RemoteMessage::decode(bytes) {
            Ok(message) => self.on_remote_action(store, message),
            Err(e) => {
                tracing::warn!(error = %e, len = bytes.len(), "dropping undecodable remote message");
                self.stats.dropped += 1;
                store.notify(Notification::RemoteDropped {
                    reason: drop_reason(&e).to_string(),
                });
                RemoteOutcome::Dropped
            }
        }
    }

    pub fn on_remote_action(&mut self, store: &mut MapStore, message: RemoteMessage) -> RemoteOutcome {
        if message.user_id == self.current_user {
            self.stats.skipped += 1;
            tracing::trace!(kind = %message.action.kind(), "skipping echo of own edit");
            return RemoteOutcome::SkippedOwn;
        }

        let kind = message.action.kind();
        store.apply_remote(&message.action);
        self.stats.applied += 1;
        tracing::debug!(user = %message.user_id, %kind, applied = self.stats.applied, "remote action");
        RemoteOutcome::Applied(kind)
    }
}

/// Short user-facing reason. The decoder error itself only goes to the log.
fn drop_reason(error: &serde_json::Error) -> &'static str {
    use serde_json::error::Category;
    match error.classify() {
        Category::Syntax | Category::Eof => "malformed message",
        Category::Data => "unsupported message",
        Category::Io => "unreadable message",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Position;
    use crate::document::MapState;
    use crate::layers::{LayerId, LayerKind, LayerState};
    use crate::shapes::MapObject;

    fn store() -> (MapStore, MapObject) {
        let layer = LayerId::new();
        let obj = MapObject::planting(layer, 7, Position::new(3, 4));
        let state = MapState::new()
            .with_layer(layer, LayerState::new(LayerKind::Plants, "Plants"))
            .with_object(obj.clone());
        (MapStore::init(state, 100), obj)
    }

    #[test]
    fn own_messages_are_skipped() {
        let (mut store, obj) = store();
        let mut reconciler = RemoteReconciler::new("alice");
        let bytes = RemoteMessage::new("alice", Action::delete([obj.id]))
            .encode()
            .unwrap();

        let outcome = reconciler.on_remote_message(&mut store, &bytes);
        assert_eq!(outcome, RemoteOutcome::SkippedOwn);
        assert!(store.state().contains(obj.id));
    }

    #[test]
    fn remote_delete_is_not_undoable() {
        let (mut store, obj) = store();
        let mut reconciler = RemoteReconciler::new("alice");
        let bytes = RemoteMessage::new("bob", Action::delete([obj.id]))
            .encode()
            .unwrap();

        assert!(reconciler.on_remote_message(&mut store, &bytes).changed());
        assert!(!store.state().contains(obj.id));
        assert!(!store.can_undo());

        // duplicate delivery leaves the state alone
        let before = store.state().clone();
        reconciler.on_remote_message(&mut store, &bytes);
        assert_eq!(store.state(), &before);
        assert_eq!(reconciler.stats().applied, 2);
    }

    #[test]
    fn garbage_is_dropped_and_reported() {
        let (mut store, _) = store();
        let mut reconciler = RemoteReconciler::new("alice");

        let outcome = reconciler.on_remote_message(&mut store, b"{not json");
        assert_eq!(outcome, RemoteOutcome::Dropped);
        assert_eq!(
            store.drain_notifications(),
            vec![Notification::RemoteDropped {
                reason: "malformed message".into()
            }]
        );

        let outcome = reconciler.on_remote_message(&mut store, br#"{"user_id": "bob"}"#);
        assert_eq!(outcome, RemoteOutcome::Dropped);
        assert_eq!(
            store.drain_notifications(),
            vec![Notification::RemoteDropped {
                reason: "unsupported message".into()
            }]
        );
        assert_eq!(reconciler.stats().dropped, 2);
    }
}
