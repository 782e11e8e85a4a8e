use serde::{Deserialize, Serialize};

use super::{Action, join_batch};
use crate::canvas::Position;
use crate::document::MapState;
use crate::persistence::{PersistenceApi, PersistenceError};
use crate::shapes::ObjectId;

/// New position for one object of a move batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMove {
    pub id: ObjectId,
    pub position: Position,
}

impl ObjectMove {
    pub fn new(id: ObjectId, position: Position) -> Self {
        Self { id, position }
    }
}

/// Drag-end of one or more selected objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAction {
    pub moves: Vec<ObjectMove>,
}

impl MoveAction {
    pub fn new(moves: impl IntoIterator<Item = ObjectMove>) -> Self {
        Self {
            moves: moves.into_iter().collect(),
        }
    }

    pub fn apply(&self, state: &MapState) -> MapState {
        let mut next = state.clone();
        for mv in &self.moves {
            next.update_object(mv.id, |o| {
                let mut moved = o.clone();
                moved.position = mv.position;
                moved
            });
        }
        next
    }

    /// Move back to the prior positions of the objects still present
    pub fn reverse(&self, state: &MapState) -> Option<Action> {
        let prior: Vec<_> = self
            .moves
            .iter()
            .filter_map(|mv| state.object(mv.id).map(|o| ObjectMove::new(o.id, o.position)))
            .collect();
        if prior.is_empty() {
            None
        } else {
            Some(Action::move_objects(prior))
        }
    }

    pub async fn execute(&self, api: &dyn PersistenceApi) -> Result<(), PersistenceError> {
        join_batch(self.moves.iter().map(|mv| api.move_object(mv.id, mv.position))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerId, LayerKind, LayerState};
    use crate::shapes::MapObject;

    #[test]
    fn batch_moves_every_member() {
        let layer = LayerId::new();
        let p1 = MapObject::planting(layer, 1, Position::new(0, 0));
        let p2 = MapObject::planting(layer, 2, Position::new(5, 5));
        let state = MapState::new()
            .with_layer(layer, LayerState::new(LayerKind::Plants, "Plants"))
            .with_object(p1.clone())
            .with_object(p2.clone());

        let action = MoveAction::new([
            ObjectMove::new(p1.id, Position::new(10, 0)),
            ObjectMove::new(p2.id, Position::new(15, 5)),
        ]);
        let next = action.apply(&state);
        assert_eq!(next.object(p1.id).unwrap().position, Position::new(10, 0));
        assert_eq!(next.object(p2.id).unwrap().position, Position::new(15, 5));
    }

    #[test]
    fn reverse_covers_remaining_subset() {
        let layer = LayerId::new();
        let p1 = MapObject::planting(layer, 1, Position::new(0, 0));
        let gone = ObjectId::new();
        let state = MapState::new()
            .with_layer(layer, LayerState::new(LayerKind::Plants, "Plants"))
            .with_object(p1.clone());

        let action = MoveAction::new([
            ObjectMove::new(p1.id, Position::new(10, 0)),
            ObjectMove::new(gone, Position::new(1, 1)),
        ]);
        assert_eq!(
            action.reverse(&state),
            Some(Action::move_objects([ObjectMove::new(p1.id, Position::new(0, 0))]))
        );

        let empty = MapState::new().with_layer(layer, LayerState::new(LayerKind::Plants, "Plants"));
        assert_eq!(action.reverse(&empty), None);
    }
}
