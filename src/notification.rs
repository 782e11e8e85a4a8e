//! User-facing, non-blocking notifications emitted by the store.

use crate::actions::{Action, ActionKind};
use crate::persistence::PersistenceError;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Undone(ActionKind),
    Redone(ActionKind),
    /// Nothing the entry touched is left to restore; history and state were left alone
    CannotUndo(ActionKind),
    /// A dispatched edit could not be persisted and is no longer applied
    PersistFailed {
        kind: ActionKind,
        error: PersistenceError,
        /// Set for transient failures so the UI can offer a retry
        retry: Option<Action>,
    },
    /// The server call issued for an undo or redo failed
    CompensationFailed {
        kind: ActionKind,
        error: PersistenceError,
    },
    /// A collaboration message could not be decoded and was dropped
    RemoteDropped { reason: String },
}

impl Notification {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notification::PersistFailed { .. }
                | Notification::CompensationFailed { .. }
                | Notification::RemoteDropped { .. }
        )
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::Undone(kind) => write!(f, "Undid {}", kind),
            Notification::Redone(kind) => write!(f, "Redid {}", kind),
            Notification::CannotUndo(kind) => write!(f, "Cannot undo {}", kind),
            Notification::PersistFailed { kind, error, retry } => {
                write!(f, "Could not save {}: {}", kind, error)?;
                if retry.is_some() {
                    write!(f, " (retry possible)")?;
                }
                Ok(())
            }
            Notification::CompensationFailed { kind, error } => {
                write!(f, "Could not sync undo/redo of {}: {}", kind, error)
            }
            Notification::RemoteDropped { reason } => {
                write!(f, "Dropped collaboration update: {}", reason)
            }
        }
    }
}
