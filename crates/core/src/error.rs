use crate::types::{DbId, RevNum};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Revision {requested} out of range (current revision: {current:?})")]
    RevisionOutOfRange {
        requested: RevNum,
        current: Option<RevNum>,
    },

    #[error("Patch application failed: {0}")]
    PatchApplication(String),

    #[error("Revision history is inconsistent: {0}")]
    Consistency(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error means stored history is corrupt.
    ///
    /// These are never recovered from locally; the affected page is unusable
    /// until its history is repaired.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            CoreError::PatchApplication(_) | CoreError::Consistency(_)
        )
    }
}
