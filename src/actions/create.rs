use serde::{Deserialize, Serialize};

use super::{Action, join_batch};
use crate::document::MapState;
use crate::persistence::{PersistenceApi, PersistenceError};
use crate::shapes::MapObject;

/// Place new objects on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAction {
    pub objects: Vec<MapObject>,
}

impl CreateAction {
    pub fn new(objects: impl IntoIterator<Item = MapObject>) -> Self {
        Self {
            objects: objects.into_iter().collect(),
        }
    }

    /// Delivering the same create twice replaces the object in place
    pub fn apply(&self, state: &MapState) -> MapState {
        let mut next = state.clone();
        for object in &self.objects {
            next.upsert_object(object.clone());
        }
        next
    }

    /// Delete the objects `state` does not have. When every id already
    /// exists there, the create overwrote them and undoing restores the
    /// versions in `state` instead.
    pub fn reverse(&self, state: &MapState) -> Option<Action> {
        if self.objects.is_empty() {
            return None;
        }
        let absent: Vec<_> = self
            .objects
            .iter()
            .map(|o| o.id)
            .filter(|id| !state.contains(*id))
            .collect();
        if !absent.is_empty() {
            return Some(Action::delete(absent));
        }
        Some(Action::create(
            self.objects.iter().filter_map(|o| state.object(o.id).cloned()),
        ))
    }

    pub async fn execute(&self, api: &dyn PersistenceApi) -> Result<(), PersistenceError> {
        join_batch(self.objects.iter().map(|o| api.create(o))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Position;
    use crate::layers::{LayerId, LayerKind, LayerState};

    #[test]
    fn duplicate_delivery_is_idempotent() {
        let layer = LayerId::new();
        let state = MapState::new().with_layer(layer, LayerState::new(LayerKind::Plants, "Plants"));
        let action = CreateAction::new([MapObject::planting(layer, 1, Position::new(3, 4))]);

        let once = action.apply(&state);
        let twice = action.apply(&once);
        assert_eq!(once, twice);
        assert_eq!(twice.object_count(), 1);
    }

    #[test]
    fn reverse_deletes_created_ids() {
        let layer = LayerId::new();
        let obj = MapObject::planting(layer, 1, Position::new(0, 0));
        let action = CreateAction::new([obj.clone()]);
        assert_eq!(
            action.reverse(&MapState::new()),
            Some(Action::delete([obj.id]))
        );
        assert_eq!(CreateAction::new([]).reverse(&MapState::new()), None);
    }

    #[test]
    fn reverse_restores_overwritten_objects() {
        let layer = LayerId::new();
        let before = MapObject::planting(layer, 1, Position::new(7, 7));
        let state = MapState::new()
            .with_layer(layer, LayerState::new(LayerKind::Plants, "Plants"))
            .with_object(before.clone());
        let mut again = before.clone();
        again.position = Position::new(0, 0);

        let action = CreateAction::new([again]);
        assert_eq!(action.reverse(&state), Some(Action::create([before])));
        let inverse = action.reverse(&state).unwrap();
        assert_eq!(inverse.apply(&action.apply(&state)), state);
    }
}
