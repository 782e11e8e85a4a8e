//! Error types for the editor core.
//!
//! Persistence failures have their own type in `persistence`; everything the
//! editor itself can reject lands here.

use chrono::NaiveDate;
use thiserror::Error;

use crate::shapes::ObjectId;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("object {0} appears more than once in the map")]
    DuplicateObject(ObjectId),
    #[error("add date {add} must be before remove date {remove}")]
    InvalidDateRange { add: NaiveDate, remove: NaiveDate },
    #[error("no plantings selected")]
    EmptySelection,
    #[error("editor session is closed")]
    SessionClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}
