//! Map snapshot files
//!
//! A snapshot is the JSON form of the hydrated layers the editor starts from.
//! Layers are stored as a list so the file stays readable and ids that occur
//! twice are caught on load.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::document::MapState;
use crate::layers::{LayerId, LayerState};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct MapSnapshot {
    version: u32,
    layers: Vec<LayerRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerRecord {
    id: LayerId,
    #[serde(flatten)]
    layer: LayerState,
}

/// Load a map snapshot
pub fn load_map(path: &Path) -> Result<MapState> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let snapshot: MapSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Invalid map snapshot {}", path.display()))?;

    if snapshot.version != SNAPSHOT_VERSION {
        tracing::warn!(version = snapshot.version, "unexpected snapshot version, loading anyway");
    }

    let state = MapState::from_layers(snapshot.layers.into_iter().map(|r| (r.id, r.layer)))
        .with_context(|| format!("Invalid map snapshot {}", path.display()))?;
    tracing::debug!(path = %path.display(), objects = state.object_count(), "map loaded");
    Ok(state)
}

/// Save a map snapshot, creating parent directories as needed
pub fn save_map(state: &MapState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let snapshot = MapSnapshot {
        version: SNAPSHOT_VERSION,
        layers: state
            .layers()
            .map(|(id, layer)| LayerRecord {
                id: *id,
                layer: layer.clone(),
            })
            .collect(),
    };
    let content = serde_json::to_string_pretty(&snapshot).context("Failed to serialize map")?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
