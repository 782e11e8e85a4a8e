//! Object types placed on map layers.
//!
//! `MapObject` carries the geometry every object shares; `ObjectKind` holds
//! what is specific to each kind. Plantings are the only kind edited here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::{Position, Size, Transform};
use crate::error::EditorError;
use crate::layers::LayerId;

/// Object identifier - UUID so clients can create ids without a round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A planting: one plant placed on the map for a span of time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planting {
    pub plant_id: i32,
    pub additional_name: Option<String>,
    pub add_date: Option<NaiveDate>,
    pub remove_date: Option<NaiveDate>,
}

impl Planting {
    pub fn new(plant_id: i32) -> Self {
        Self {
            plant_id,
            additional_name: None,
            add_date: None,
            remove_date: None,
        }
    }

    /// Check that the planting is added before it is removed
    pub fn validate_dates(&self) -> Result<(), EditorError> {
        match (self.add_date, self.remove_date) {
            (Some(add), Some(remove)) if add >= remove => {
                Err(EditorError::InvalidDateRange { add, remove })
            }
            _ => Ok(()),
        }
    }
}

/// Kind-specific data of a map object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ObjectKind {
    Planting(Planting),
}

/// An object on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapObject {
    pub id: ObjectId,
    pub layer_id: LayerId,
    pub position: Position,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub transform: Transform,
    pub kind: ObjectKind,
}

impl MapObject {
    /// A planting at `position` with default size and no transform
    pub fn planting(layer_id: LayerId, plant_id: i32, position: Position) -> Self {
        Self {
            id: ObjectId::new(),
            layer_id,
            position,
            size: Size::default(),
            transform: Transform::default(),
            kind: ObjectKind::Planting(Planting::new(plant_id)),
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn as_planting(&self) -> Option<&Planting> {
        match &self.kind {
            ObjectKind::Planting(p) => Some(p),
        }
    }

    /// Current value of the attribute `like` refers to (the value in `like` is ignored)
    pub fn attribute_of(&self, like: &PlantingAttribute) -> Option<PlantingAttribute> {
        let planting = self.as_planting()?;
        Some(match like {
            PlantingAttribute::AddDate(_) => PlantingAttribute::AddDate(planting.add_date),
            PlantingAttribute::RemoveDate(_) => PlantingAttribute::RemoveDate(planting.remove_date),
            PlantingAttribute::AdditionalName(_) => {
                PlantingAttribute::AdditionalName(planting.additional_name.clone())
            }
        })
    }

    /// Copy of this object with the attribute set
    pub fn with_attribute(&self, attribute: &PlantingAttribute) -> Self {
        let mut next = self.clone();
        match &mut next.kind {
            ObjectKind::Planting(p) => match attribute {
                PlantingAttribute::AddDate(date) => p.add_date = *date,
                PlantingAttribute::RemoveDate(date) => p.remove_date = *date,
                PlantingAttribute::AdditionalName(name) => p.additional_name = name.clone(),
            },
        }
        next
    }
}

/// A single editable planting attribute together with its new value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value")]
pub enum PlantingAttribute {
    AddDate(Option<NaiveDate>),
    RemoveDate(Option<NaiveDate>),
    AdditionalName(Option<String>),
}
