//! Debounced commits for form fields
//!
//! Typing into a date field should not produce one history entry per
//! keystroke. Each new value cancels the pending commit and schedules a new
//! one, so only the value still outstanding after the delay is dispatched.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::actions::{Action, UpdateAttributesAction};
use crate::dispatcher::DispatcherHandle;
use crate::error::EditorError;
use crate::shapes::{ObjectId, PlantingAttribute};

/// Cancellable delayed commit of the latest value
pub struct Debouncer<T> {
    delay: Duration,
    commit: Arc<dyn Fn(T) + Send + Sync>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, commit: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            commit: Arc::new(commit),
            pending: None,
        }
    }

    /// Replace any pending value with `value`
    pub fn schedule(&mut self, value: T) {
        self.cancel();
        let commit = Arc::clone(&self.commit);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            commit(value);
        }));
    }

    /// Drop the pending value. Returns whether one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

/// Submit status of one form field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldStatus {
    Idle,
    /// A value is waiting for the debounce delay
    Pending,
    /// The last committed value was rejected
    Invalid(String),
}

/// One debounced date field bound to a planting attribute
struct DateField {
    debouncer: Debouncer<Option<NaiveDate>>,
    status: watch::Sender<FieldStatus>,
}

impl DateField {
    fn new(
        delay: Duration,
        handle: DispatcherHandle,
        selection: Arc<[ObjectId]>,
        attribute: fn(Option<NaiveDate>) -> PlantingAttribute,
    ) -> Self {
        let (status, _) = watch::channel(FieldStatus::Idle);
        let commit_status = status.clone();
        let debouncer = Debouncer::new(delay, move |value| {
            let update = UpdateAttributesAction::for_selection(
                selection.iter().copied(),
                attribute(value),
            );
            let result = submit(&handle, update);
            commit_status.send_replace(match result {
                Ok(()) => FieldStatus::Idle,
                Err(e) => {
                    tracing::debug!(error = %e, "date field rejected");
                    FieldStatus::Invalid(e.to_string())
                }
            });
        });
        Self { debouncer, status }
    }

    fn input(&mut self, value: Option<NaiveDate>) {
        self.status.send_replace(FieldStatus::Pending);
        self.debouncer.schedule(value);
    }
}

fn submit(handle: &DispatcherHandle, update: UpdateAttributesAction) -> Result<(), EditorError> {
    if update.updates.is_empty() {
        return Err(EditorError::EmptySelection);
    }
    update.validate(&handle.state())?;
    handle.dispatch(Action::UpdateAttributes(update))
}

/// Attribute form for the selected plantings
pub struct PlantingAttributeForm {
    add_date: DateField,
    remove_date: DateField,
}

impl PlantingAttributeForm {
    pub fn new(
        handle: DispatcherHandle,
        selection: impl IntoIterator<Item = ObjectId>,
        delay: Duration,
    ) -> Self {
        let selection: Arc<[ObjectId]> = selection.into_iter().collect();
        Self {
            add_date: DateField::new(
                delay,
                handle.clone(),
                Arc::clone(&selection),
                PlantingAttribute::AddDate,
            ),
            remove_date: DateField::new(delay, handle, selection, PlantingAttribute::RemoveDate),
        }
    }

    pub fn set_add_date(&mut self, date: Option<NaiveDate>) {
        self.add_date.input(date);
    }

    pub fn set_remove_date(&mut self, date: Option<NaiveDate>) {
        self.remove_date.input(date);
    }

    pub fn add_date_status(&self) -> watch::Receiver<FieldStatus> {
        self.add_date.status.subscribe()
    }

    pub fn remove_date_status(&self) -> watch::Receiver<FieldStatus> {
        self.remove_date.status.subscribe()
    }
}
