use serde::{Deserialize, Serialize};

use super::{Action, join_batch};
use crate::canvas::{Position, Size, Transform};
use crate::document::MapState;
use crate::persistence::{PersistenceApi, PersistenceError};
use crate::shapes::{MapObject, ObjectId};

/// Resulting geometry of one object after a transform-end gesture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectTransform {
    pub id: ObjectId,
    pub position: Position,
    pub size: Size,
    pub transform: Transform,
}

impl ObjectTransform {
    pub fn new(id: ObjectId, position: Position, size: Size, transform: Transform) -> Self {
        Self {
            id,
            position,
            size,
            transform,
        }
    }

    /// Current geometry of `object`
    pub fn of(object: &MapObject) -> Self {
        Self::new(object.id, object.position, object.size, object.transform)
    }
}

/// Rotate, scale or resize one or more objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformAction {
    pub transforms: Vec<ObjectTransform>,
}

impl TransformAction {
    pub fn new(transforms: impl IntoIterator<Item = ObjectTransform>) -> Self {
        Self {
            transforms: transforms.into_iter().collect(),
        }
    }

    pub fn apply(&self, state: &MapState) -> MapState {
        let mut next = state.clone();
        for t in &self.transforms {
            next.update_object(t.id, |o| {
                let mut changed = o.clone();
                changed.position = t.position;
                changed.size = t.size;
                changed.transform = t.transform;
                changed
            });
        }
        next
    }

    pub fn reverse(&self, state: &MapState) -> Option<Action> {
        let prior: Vec<_> = self
            .transforms
            .iter()
            .filter_map(|t| state.object(t.id).map(ObjectTransform::of))
            .collect();
        if prior.is_empty() {
            None
        } else {
            Some(Action::transform(prior))
        }
    }

    pub async fn execute(&self, api: &dyn PersistenceApi) -> Result<(), PersistenceError> {
        join_batch(
            self.transforms
                .iter()
                .map(|t| api.transform(t.id, t.position, t.size, t.transform)),
        )
        .await
    }
}
