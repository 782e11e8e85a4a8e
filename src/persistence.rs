//! Remote persistence seam.
//!
//! The editor only sees `PersistenceApi`; the real implementation talks to the
//! map server. `MemoryBackend` keeps objects in memory, records every call and
//! can be told to fail, which is what the tests and the CLI run against.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::canvas::{Position, Size, Transform};
use crate::shapes::{MapObject, ObjectId, PlantingAttribute};

/// Why a persistence call failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("object {0} not found")]
    NotFound(ObjectId),
    #[error("rejected by server: {0}")]
    Validation(String),
    #[error("conflicting write on object {0}")]
    Conflict(ObjectId),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
}

impl PersistenceError {
    /// Worth retrying: the request may succeed if sent again
    pub fn is_transient(&self) -> bool {
        match self {
            PersistenceError::Network(_) => true,
            PersistenceError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The target does not exist on the server (already deleted)
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistenceError::NotFound(_))
    }
}

/// Server operations, idempotent per object id
#[async_trait]
pub trait PersistenceApi: Send + Sync {
    /// Create an object; creating an id that already exists overwrites it
    async fn create(&self, object: &MapObject) -> Result<MapObject, PersistenceError>;

    /// Delete an object; `Ok(false)` if there was nothing to delete
    async fn delete(&self, id: ObjectId) -> Result<bool, PersistenceError>;

    async fn move_object(
        &self,
        id: ObjectId,
        position: Position,
    ) -> Result<MapObject, PersistenceError>;

    async fn transform(
        &self,
        id: ObjectId,
        position: Position,
        size: Size,
        transform: Transform,
    ) -> Result<MapObject, PersistenceError>;

    async fn update_attributes(
        &self,
        id: ObjectId,
        attribute: &PlantingAttribute,
    ) -> Result<MapObject, PersistenceError>;
}

/// A call received by the in-memory backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Create(ObjectId),
    Delete(ObjectId),
    Move(ObjectId, Position),
    Transform(ObjectId),
    UpdateAttributes(ObjectId, PlantingAttribute),
}

impl BackendCall {
    pub fn target(&self) -> ObjectId {
        match self {
            BackendCall::Create(id)
            | BackendCall::Delete(id)
            | BackendCall::Move(id, _)
            | BackendCall::Transform(id)
            | BackendCall::UpdateAttributes(id, _) => *id,
        }
    }
}

#[derive(Default)]
struct BackendState {
    objects: HashMap<ObjectId, MapObject>,
    calls: Vec<BackendCall>,
    fail_next: VecDeque<PersistenceError>,
    failing: HashMap<ObjectId, PersistenceError>,
}

impl BackendState {
    /// Record the call and pick the injected failure for it, if any
    fn record(&mut self, call: BackendCall) -> Result<(), PersistenceError> {
        let target = call.target();
        self.calls.push(call);
        if let Some(err) = self.fail_next.pop_front() {
            return Err(err);
        }
        match self.failing.get(&target) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn existing(&mut self, id: ObjectId) -> Result<&mut MapObject, PersistenceError> {
        self.objects.get_mut(&id).ok_or(PersistenceError::NotFound(id))
    }
}

struct Inner {
    state: Mutex<BackendState>,
    latency: Option<Duration>,
}

/// In-memory server with failure injection
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Every call sleeps for `latency` before touching the store
    pub fn with_latency(latency: Duration) -> Self {
        Self::build(Some(latency))
    }

    fn build(latency: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BackendState::default()),
                latency,
            }),
        }
    }

    /// Seed the server with already-persisted objects
    pub async fn seed(&self, objects: impl IntoIterator<Item = MapObject>) {
        let mut state = self.inner.state.lock().await;
        for object in objects {
            state.objects.insert(object.id, object);
        }
    }

    /// Fail the next call, whatever it targets
    pub async fn fail_next(&self, err: PersistenceError) {
        self.inner.state.lock().await.fail_next.push_back(err);
    }

    /// Fail every call targeting `id` until cleared
    pub async fn fail_object(&self, id: ObjectId, err: PersistenceError) {
        self.inner.state.lock().await.failing.insert(id, err);
    }

    pub async fn clear_failures(&self) {
        let mut state = self.inner.state.lock().await;
        state.fail_next.clear();
        state.failing.clear();
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.inner.state.lock().await.calls.clone()
    }

    pub async fn object(&self, id: ObjectId) -> Option<MapObject> {
        self.inner.state.lock().await.objects.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn delay(&self) {
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl PersistenceApi for MemoryBackend {
    async fn create(&self, object: &MapObject) -> Result<MapObject, PersistenceError> {
        self.delay().await;
        let mut state = self.inner.state.lock().await;
        state.record(BackendCall::Create(object.id))?;
        if let Some(planting) = object.as_planting() {
            planting
                .validate_dates()
                .map_err(|e| PersistenceError::Validation(e.to_string()))?;
        }
        state.objects.insert(object.id, object.clone());
        Ok(object.clone())
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, PersistenceError> {
        self.delay().await;
        let mut state = self.inner.state.lock().await;
        state.record(BackendCall::Delete(id))?;
        Ok(state.objects.remove(&id).is_some())
    }

    async fn move_object(
        &self,
        id: ObjectId,
        position: Position,
    ) -> Result<MapObject, PersistenceError> {
        self.delay().await;
        let mut state = self.inner.state.lock().await;
        state.record(BackendCall::Move(id, position))?;
        let object = state.existing(id)?;
        object.position = position;
        Ok(object.clone())
    }

    async fn transform(
        &self,
        id: ObjectId,
        position: Position,
        size: Size,
        transform: Transform,
    ) -> Result<MapObject, PersistenceError> {
        self.delay().await;
        let mut state = self.inner.state.lock().await;
        state.record(BackendCall::Transform(id))?;
        let object = state.existing(id)?;
        object.position = position;
        object.size = size;
        object.transform = transform;
        Ok(object.clone())
    }

    async fn update_attributes(
        &self,
        id: ObjectId,
        attribute: &PlantingAttribute,
    ) -> Result<MapObject, PersistenceError> {
        self.delay().await;
        let mut state = self.inner.state.lock().await;
        state.record(BackendCall::UpdateAttributes(id, attribute.clone()))?;
        let object = state.existing(id)?;
        let updated = object.with_attribute(attribute);
        if let Some(planting) = updated.as_planting() {
            planting
                .validate_dates()
                .map_err(|e| PersistenceError::Validation(e.to_string()))?;
        }
        *object = updated.clone();
        Ok(updated)
    }
}
