use serde::{Deserialize, Serialize};

use super::{Action, join_batch};
use crate::document::MapState;
use crate::persistence::{PersistenceApi, PersistenceError};
use crate::shapes::ObjectId;

/// Remove objects from the map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAction {
    pub ids: Vec<ObjectId>,
}

impl DeleteAction {
    pub fn new(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn apply(&self, state: &MapState) -> MapState {
        let mut next = state.clone();
        for id in &self.ids {
            next.remove_object(*id);
        }
        next
    }

    /// A bare id cannot bring an object back, so the inverse snapshots every
    /// object still present in `state`.
    pub fn reverse(&self, state: &MapState) -> Option<Action> {
        let snapshots: Vec<_> = self
            .ids
            .iter()
            .filter_map(|id| state.object(*id).cloned())
            .collect();
        if snapshots.is_empty() {
            None
        } else {
            Some(Action::create(snapshots))
        }
    }

    pub async fn execute(&self, api: &dyn PersistenceApi) -> Result<(), PersistenceError> {
        join_batch(self.ids.iter().map(|id| async move {
            let removed = api.delete(*id).await?;
            if !removed {
                tracing::debug!(object = %id, "delete found nothing on the server");
            }
            Ok::<_, PersistenceError>(())
        }))
        .await
    }
}
