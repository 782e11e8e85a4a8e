//! Reversible, persistable edits.
//!
//! An `Action` is one unit of change on the map. It has three capabilities:
//!
//! - `apply` turns a `MapState` into the next one. Pure and total: a missing
//!   target is a no-op, never an error, so actions can be replayed and
//!   remote actions can arrive in any order.
//! - `reverse` inspects the state *before* the action applies and builds the
//!   action that undoes it, or `None` when nothing is left to undo.
//! - `execute` performs the matching server call. It is the only place that
//!   does I/O.
//!
//! Batched variants (move, transform, attribute updates, and the create and
//! delete sets) touch several objects but are one history entry.
//!
//! Actions serialize as `{"type": ..., "payload": ...}`, which is also the
//! format collaborators receive on the collaboration channel.

pub mod attributes;
pub mod create;
pub mod delete;
pub mod movement;
pub mod transform;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::document::MapState;
use crate::persistence::{PersistenceApi, PersistenceError};
use crate::shapes::{MapObject, ObjectId};

pub use attributes::{AttributeUpdate, UpdateAttributesAction};
pub use create::CreateAction;
pub use delete::DeleteAction;
pub use movement::{MoveAction, ObjectMove};
pub use transform::{ObjectTransform, TransformAction};

/// The kind of an action, for notifications and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Create,
    Delete,
    Move,
    Transform,
    UpdateAttributes,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Create => "create planting",
            ActionKind::Delete => "delete planting",
            ActionKind::Move => "move planting",
            ActionKind::Transform => "transform planting",
            ActionKind::UpdateAttributes => "update planting attributes",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One reversible edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create(CreateAction),
    Delete(DeleteAction),
    Move(MoveAction),
    Transform(TransformAction),
    UpdateAttributes(UpdateAttributesAction),
}

impl Action {
    pub fn create(objects: impl IntoIterator<Item = MapObject>) -> Self {
        Action::Create(CreateAction::new(objects))
    }

    pub fn delete(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Action::Delete(DeleteAction::new(ids))
    }

    pub fn move_objects(moves: impl IntoIterator<Item = ObjectMove>) -> Self {
        Action::Move(MoveAction::new(moves))
    }

    pub fn transform(transforms: impl IntoIterator<Item = ObjectTransform>) -> Self {
        Action::Transform(TransformAction::new(transforms))
    }

    pub fn update_attributes(updates: impl IntoIterator<Item = AttributeUpdate>) -> Self {
        Action::UpdateAttributes(UpdateAttributesAction::new(updates))
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Create(_) => ActionKind::Create,
            Action::Delete(_) => ActionKind::Delete,
            Action::Move(_) => ActionKind::Move,
            Action::Transform(_) => ActionKind::Transform,
            Action::UpdateAttributes(_) => ActionKind::UpdateAttributes,
        }
    }

    /// Ids this action touches
    pub fn targets(&self) -> Vec<ObjectId> {
        match self {
            Action::Create(a) => a.objects.iter().map(|o| o.id).collect(),
            Action::Delete(a) => a.ids.clone(),
            Action::Move(a) => a.moves.iter().map(|m| m.id).collect(),
            Action::Transform(a) => a.transforms.iter().map(|t| t.id).collect(),
            Action::UpdateAttributes(a) => a.updates.iter().map(|u| u.id).collect(),
        }
    }

    /// Produce the next state. Never fails; missing targets are skipped.
    pub fn apply(&self, state: &MapState) -> MapState {
        match self {
            Action::Create(a) => a.apply(state),
            Action::Delete(a) => a.apply(state),
            Action::Move(a) => a.apply(state),
            Action::Transform(a) => a.apply(state),
            Action::UpdateAttributes(a) => a.apply(state),
        }
    }

    /// Action that takes a state with this action applied back to `state`,
    /// the same state without it
    pub fn reverse(&self, state: &MapState) -> Option<Action> {
        match self {
            Action::Create(a) => a.reverse(state),
            Action::Delete(a) => a.reverse(state),
            Action::Move(a) => a.reverse(state),
            Action::Transform(a) => a.reverse(state),
            Action::UpdateAttributes(a) => a.reverse(state),
        }
    }

    /// Persist this edit on the server
    pub async fn execute(&self, api: &dyn PersistenceApi) -> Result<(), PersistenceError> {
        match self {
            Action::Create(a) => a.execute(api).await,
            Action::Delete(a) => a.execute(api).await,
            Action::Move(a) => a.execute(api).await,
            Action::Transform(a) => a.execute(api).await,
            Action::UpdateAttributes(a) => a.execute(api).await,
        }
    }
}

/// Run every member call of a batch concurrently; the batch fails if any
/// member fails. With several failures the most severe one is reported, so
/// a lone `NotFound` never hides a network error or a rejected member.
pub(crate) async fn join_batch<T, F>(
    calls: impl IntoIterator<Item = F>,
) -> Result<(), PersistenceError>
where
    F: Future<Output = Result<T, PersistenceError>>,
{
    let results = futures::future::join_all(calls).await;
    let total = results.len();
    let failures: Vec<_> = results.into_iter().filter_map(Result::err).collect();
    let failed = failures.len();
    let Some(worst) = failures.into_iter().min_by_key(severity) else {
        return Ok(());
    };
    if failed > 1 {
        tracing::warn!(failed, total, error = %worst, "batch persistence failed");
    }
    Err(worst)
}

/// Lower is reported first
fn severity(error: &PersistenceError) -> u8 {
    if error.is_transient() {
        0
    } else if error.is_not_found() {
        2
    } else {
        1
    }
}
