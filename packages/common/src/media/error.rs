use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by the variant pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The payload was rejected before any processing (bad mime, oversize).
    #[error("invalid upload: {0}")]
    Validation(String),

    /// The bytes could not be decoded or their dimensions determined.
    #[error("variant generation failed: {0}")]
    Generation(String),

    /// A storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Some but not all variants of one image were stored; the successful
    /// ones have been rolled back.
    #[error("{stored} of {total} variants stored; rolled back after: {first_error}")]
    PartialFailure {
        stored: usize,
        total: usize,
        first_error: String,
    },

    /// Reprocessing could not locate original bytes for a catalog row.
    #[error("no original bytes found for '{0}'")]
    ReferenceNotFound(String),
}
