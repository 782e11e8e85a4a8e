//! gardenmap - optimistic, undoable editing core for collaborative garden maps
//!
//! Edits are `Action`s. The `OptimisticDispatcher` applies them to the local
//! `MapState` at once, records them in the `HistoryStack`, and persists them
//! in the background; failures roll the edit back. Undo and redo rebuild the
//! state by replaying history and send compensating server calls. Edits made
//! by collaborators arrive as `RemoteMessage`s and are applied without
//! entering local history.

pub mod actions;
pub mod canvas;
pub mod config;
pub mod debounce;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod file_io;
pub mod history;
pub mod layers;
pub mod notification;
pub mod persistence;
pub mod shapes;
pub mod store;
pub mod sync;

pub use actions::{Action, ActionKind};
pub use config::EditorConfig;
pub use dispatcher::{DispatcherHandle, EditorSnapshot, OptimisticDispatcher, SpawnedDispatcher};
pub use document::MapState;
pub use error::EditorError;
pub use notification::Notification;
pub use persistence::{MemoryBackend, PersistenceApi, PersistenceError};
pub use store::MapStore;
pub use sync::{RemoteMessage, RemoteReconciler};
