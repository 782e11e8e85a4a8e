//! The map document - an immutable snapshot of every layer and object.
//!
//! Every transition produces a new `MapState`; nothing mutates a state that
//! has already been published. Mutating helpers are crate-private and only
//! used on fresh clones inside `Action::apply`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EditorError;
use crate::layers::{LayerId, LayerState};
use crate::shapes::{MapObject, ObjectId};

/// Snapshot of all layers being edited
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapState {
    layers: BTreeMap<LayerId, LayerState>,
}

impl MapState {
    /// Create an empty map with no layers
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from persisted layers, rejecting ids that appear twice
    pub fn from_layers(
        layers: impl IntoIterator<Item = (LayerId, LayerState)>,
    ) -> Result<Self, EditorError> {
        let mut seen = std::collections::HashSet::new();
        let mut map = BTreeMap::new();
        for (id, layer) in layers {
            for object in layer.objects() {
                if !seen.insert(object.id) {
                    return Err(EditorError::DuplicateObject(object.id));
                }
            }
            map.insert(id, layer);
        }
        Ok(Self { layers: map })
    }

    /// Add an empty layer
    pub fn with_layer(mut self, id: LayerId, layer: LayerState) -> Self {
        self.layers.insert(id, layer);
        self
    }

    /// Add an object to its layer (moving it if the id lives elsewhere)
    pub fn with_object(mut self, object: MapObject) -> Self {
        self.upsert_object(object);
        self
    }

    pub fn layers(&self) -> impl Iterator<Item = (&LayerId, &LayerState)> {
        self.layers.iter()
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerState> {
        self.layers.get(&id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&MapObject> {
        self.layers.values().find_map(|l| l.get(id))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.layers.values().any(|l| l.contains(id))
    }

    /// All objects, layer by layer in insertion order
    pub fn objects(&self) -> impl Iterator<Item = &MapObject> {
        self.layers.values().flat_map(|l| l.objects().iter())
    }

    pub fn object_count(&self) -> usize {
        self.layers.values().map(LayerState::len).sum()
    }

    // --- Mutation on fresh clones ---

    /// Insert or replace an object. An id present in another layer is moved
    /// so it never lives in two layers. Unknown target layers are ignored.
    pub(crate) fn upsert_object(&mut self, object: MapObject) {
        if !self.layers.contains_key(&object.layer_id) {
            tracing::debug!(object = %object.id, layer = %object.layer_id, "target layer missing, object dropped");
            return;
        }
        for (layer_id, layer) in self.layers.iter_mut() {
            if *layer_id != object.layer_id {
                layer.remove(object.id);
            }
        }
        if let Some(layer) = self.layers.get_mut(&object.layer_id) {
            layer.upsert(object);
        }
    }

    pub(crate) fn remove_object(&mut self, id: ObjectId) -> Option<MapObject> {
        self.layers.values_mut().find_map(|l| l.remove(id))
    }

    pub(crate) fn update_object(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&MapObject) -> MapObject,
    ) -> bool {
        match self.layers.values_mut().find(|l| l.contains(id)) {
            Some(layer) => layer.update(id, f),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Position;
    use crate::layers::LayerKind;

    fn two_layers() -> (MapState, LayerId, LayerId) {
        let a = LayerId::new();
        let b = LayerId::new();
        let state = MapState::new()
            .with_layer(a, LayerState::new(LayerKind::Plants, "Plants"))
            .with_layer(b, LayerState::new(LayerKind::Plants, "Alternative"));
        (state, a, b)
    }

    #[test]
    fn id_never_lives_in_two_layers() {
        let (state, a, b) = two_layers();
        let obj = MapObject::planting(a, 1, Position::new(1, 1));
        let mut moved = obj.clone();
        moved.layer_id = b;

        let state = state.with_object(obj).with_object(moved.clone());

        assert_eq!(state.object_count(), 1);
        assert!(state.layer(a).unwrap().is_empty());
        assert_eq!(state.object(moved.id), Some(&moved));
    }

    #[test]
    fn from_layers_rejects_duplicates() {
        let a = LayerId::new();
        let b = LayerId::new();
        let obj = MapObject::planting(a, 1, Position::new(0, 0));
        let mut la = LayerState::new(LayerKind::Plants, "a");
        la.upsert(obj.clone());
        let mut lb = LayerState::new(LayerKind::Plants, "b");
        lb.upsert(obj.clone());

        let err = MapState::from_layers([(a, la), (b, lb)]).unwrap_err();
        assert!(matches!(err, EditorError::DuplicateObject(id) if id == obj.id));
    }

    #[test]
    fn unknown_layer_is_ignored() {
        let (state, _, _) = two_layers();
        let orphan = MapObject::planting(LayerId::new(), 1, Position::new(0, 0));
        let state = state.with_object(orphan.clone());
        assert!(!state.contains(orphan.id));
    }
}
