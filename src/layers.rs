//! Layer types for organizing objects on the map.
//!
//! A layer owns an insertion-ordered set of objects keyed by id. Rendering
//! order follows insertion order within a layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shapes::{MapObject, ObjectId};

/// Layer identifier - UUID for global uniqueness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a layer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    Plants,
    Base,
}

/// Layer data structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub kind: LayerKind,
    pub name: String,
    pub visible: bool,
    #[serde(default)]
    objects: Vec<MapObject>,
}

impl LayerState {
    pub fn new(kind: LayerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            visible: true,
            objects: Vec::new(),
        }
    }

    pub fn objects(&self) -> &[MapObject] {
        &self.objects
    }

    pub fn get(&self, id: ObjectId) -> Option<&MapObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.iter().any(|o| o.id == id)
    }

    /// Insert or replace in place (keeps the original slot on replace)
    pub fn upsert(&mut self, object: MapObject) {
        match self.objects.iter_mut().find(|o| o.id == object.id) {
            Some(slot) => *slot = object,
            None => self.objects.push(object),
        }
    }

    /// Remove by id, returning the removed object
    pub fn remove(&mut self, id: ObjectId) -> Option<MapObject> {
        let idx = self.objects.iter().position(|o| o.id == id)?;
        Some(self.objects.remove(idx))
    }

    /// Replace an existing object by applying `f`; missing ids are ignored
    pub fn update(&mut self, id: ObjectId, f: impl FnOnce(&MapObject) -> MapObject) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(slot) => {
                *slot = f(slot);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
