//! Error types for whole-document operations.
//!
//! Individual entities that fail validation are not errors: they are dropped
//! and counted in a [`LoadReport`](crate::model::LoadReport). Gesture calls
//! made without an active operation are silent no-ops.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors loading or exporting a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// Errors surfaced by the editing context.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type CanvasResult<T> = Result<T, CanvasError>;
