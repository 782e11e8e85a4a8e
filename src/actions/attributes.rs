use serde::{Deserialize, Serialize};

use super::{Action, join_batch};
use crate::document::MapState;
use crate::error::EditorError;
use crate::persistence::{PersistenceApi, PersistenceError};
use crate::shapes::{ObjectId, PlantingAttribute};

/// New attribute value for one object of the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeUpdate {
    pub id: ObjectId,
    pub attribute: PlantingAttribute,
}

impl AttributeUpdate {
    pub fn new(id: ObjectId, attribute: PlantingAttribute) -> Self {
        Self { id, attribute }
    }
}

/// Set an attribute on one or more plantings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAttributesAction {
    pub updates: Vec<AttributeUpdate>,
}

impl UpdateAttributesAction {
    pub fn new(updates: impl IntoIterator<Item = AttributeUpdate>) -> Self {
        Self {
            updates: updates.into_iter().collect(),
        }
    }

    /// Same attribute value for every selected planting
    pub fn for_selection(
        ids: impl IntoIterator<Item = ObjectId>,
        attribute: PlantingAttribute,
    ) -> Self {
        Self::new(
            ids.into_iter()
                .map(|id| AttributeUpdate::new(id, attribute.clone())),
        )
    }

    /// Reject updates that would leave a planting removed before it is added.
    /// `apply` never checks this; callers validate before dispatching.
    pub fn validate(&self, state: &MapState) -> Result<(), EditorError> {
        for update in &self.updates {
            if let Some(object) = state.object(update.id) {
                if let Some(planting) = object.with_attribute(&update.attribute).as_planting() {
                    planting.validate_dates()?;
                }
            }
        }
        Ok(())
    }

    pub fn apply(&self, state: &MapState) -> MapState {
        let mut next = state.clone();
        for update in &self.updates {
            next.update_object(update.id, |o| o.with_attribute(&update.attribute));
        }
        next
    }

    pub fn reverse(&self, state: &MapState) -> Option<Action> {
        let prior: Vec<_> = self
            .updates
            .iter()
            .filter_map(|u| {
                let previous = state.object(u.id)?.attribute_of(&u.attribute)?;
                Some(AttributeUpdate::new(u.id, previous))
            })
            .collect();
        if prior.is_empty() {
            None
        } else {
            Some(Action::update_attributes(prior))
        }
    }

    pub async fn execute(&self, api: &dyn PersistenceApi) -> Result<(), PersistenceError> {
        join_batch(
            self.updates
                .iter()
                .map(|u| api.update_attributes(u.id, &u.attribute)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::canvas::Position;
    use crate::layers::{LayerId, LayerKind, LayerState};
    use crate::shapes::MapObject;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn state_with(objects: &[MapObject], layer: LayerId) -> MapState {
        objects.iter().cloned().fold(
            MapState::new().with_layer(layer, LayerState::new(LayerKind::Plants, "Plants")),
            MapState::with_object,
        )
    }

    #[test]
    fn reverse_captures_prior_value_per_object() {
        let layer = LayerId::new();
        let a = MapObject::planting(layer, 1, Position::new(0, 0));
        let b = MapObject::planting(layer, 2, Position::new(0, 0))
            .with_attribute(&PlantingAttribute::AddDate(Some(date(2023, 1, 1))));
        let state = state_with(&[a.clone(), b.clone()], layer);

        let action = UpdateAttributesAction::for_selection(
            [a.id, b.id],
            PlantingAttribute::AddDate(Some(date(2024, 4, 1))),
        );
        let inverse = action.reverse(&state).unwrap();
        assert_eq!(
            inverse,
            Action::update_attributes([
                AttributeUpdate::new(a.id, PlantingAttribute::AddDate(None)),
                AttributeUpdate::new(b.id, PlantingAttribute::AddDate(Some(date(2023, 1, 1)))),
            ])
        );
        assert_eq!(inverse.apply(&action.apply(&state)), state);
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let layer = LayerId::new();
        let a = MapObject::planting(layer, 1, Position::new(0, 0))
            .with_attribute(&PlantingAttribute::AddDate(Some(date(2024, 6, 1))));
        let state = state_with(&[a.clone()], layer);

        let bad = UpdateAttributesAction::for_selection(
            [a.id],
            PlantingAttribute::RemoveDate(Some(date(2024, 5, 1))),
        );
        assert!(bad.validate(&state).is_err());

        let good = UpdateAttributesAction::for_selection(
            [a.id],
            PlantingAttribute::RemoveDate(Some(date(2024, 7, 1))),
        );
        assert!(good.validate(&state).is_ok());
    }
}
