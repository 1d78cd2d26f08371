//! muster-core — the attendance capture and review workflow.
//!
//! Turns raw face-recognition results into confirmed, pending, or
//! rejected attendance events, keeps each person's time-in/time-out
//! sequence strictly alternating, runs the human-review lifecycle for
//! uncertain captures, and enforces the role/station access matrix.
//! Storage, recognition, and transport live behind the traits in
//! [`traits`].

pub mod access;
pub mod alternation;
pub mod disposition;
pub mod error;
pub mod image;
pub mod traits;
pub mod types;
pub mod workflow;

pub use error::{WorkflowError, WorkflowResult};
pub use traits::{AuditLog, PersonnelDirectory, RecognizeOutcome, Recognizer, RecordStore};
pub use types::{
    AttendanceEvent, AttendanceKind, CaptureOutcome, Disposition, EventPatch, EventQuery,
    Identity, NewAttendanceEvent, NewAuditEntry, NewPendingEntry, Page, PendingReviewEntry,
    ReviewStatus, Role, Source,
};
pub use workflow::{AttendanceWorkflow, CaptureRequest};
