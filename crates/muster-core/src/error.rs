//! Unified workflow error type.
//! Every operation in the workflow returns `WorkflowError` so callers can
//! map each kind onto a transport-level outcome exactly once.

use crate::types::{AttendanceKind, PendingId, PersonnelId, ReviewStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Malformed or unacceptable caller input. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller asked for an out-of-sequence attendance kind.
    /// Client-correctable, like `InvalidInput`, but carries both kinds so
    /// the caller can tell the user what to do instead.
    #[error("cannot record {requested}; a {expected} is expected next")]
    OutOfSequence {
        requested: AttendanceKind,
        expected: AttendanceKind,
    },

    /// The recognizer is unreachable or timed out. The workflow surfaces
    /// this immediately; retrying is the caller's decision.
    #[error("recognition service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Second review attempt on an already-terminal pending entry.
    #[error("pending entry #{id} has already been reviewed (status: {status})")]
    AlreadyReviewed { id: PendingId, status: ReviewStatus },

    /// A concurrent confirmation won the race for this person. Retried
    /// internally up to a small bound, then surfaced as-is.
    #[error("concurrent attendance confirmation for personnel #{personnel_id}, please retry")]
    AlternationConflict { personnel_id: PersonnelId },

    /// Backend storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
