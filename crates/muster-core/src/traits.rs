//! Collaborator contracts consumed by the workflow.
//!
//! The workflow core never talks to a camera, a socket, or a database
//! directly; it sees these four seams. Implementations live in the store
//! crate and the daemon; tests substitute in-memory fakes.

use crate::error::WorkflowResult;
use crate::types::{
    AttendanceEvent, EventId, EventQuery, NewAttendanceEvent, NewAuditEntry, NewPendingEntry,
    Page, PendingId, PendingReviewEntry, PersonnelId, ReviewStatus, StationId, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Reply from the external face recognizer.
///
/// An affirmative no-match is a business outcome, not a fault: it carries
/// its own (typically near-zero) confidence. Transport failures surface as
/// [`WorkflowError::ServiceUnavailable`](crate::WorkflowError::ServiceUnavailable)
/// through the `Result` instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecognizeOutcome {
    Match {
        personnel_id: PersonnelId,
        confidence: f64,
    },
    NoMatch {
        confidence: f64,
    },
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Identify the face in `image`, scanning the gallery of `station_id`.
    async fn recognize(
        &self,
        image: &str,
        station_id: StationId,
    ) -> WorkflowResult<RecognizeOutcome>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The most recent confirmed event for a person, ordered by
    /// `captured_at` descending, tie-broken by `id` descending.
    async fn last_confirmed(
        &self,
        personnel_id: PersonnelId,
    ) -> WorkflowResult<Option<AttendanceEvent>>;

    /// Insert a confirmed event. The store re-derives the expected kind
    /// inside the same write transaction and fails with
    /// `AlternationConflict` if the event's kind is out of sequence; the
    /// workflow retries from the alternator on that error.
    async fn save_confirmed(&self, event: NewAttendanceEvent) -> WorkflowResult<AttendanceEvent>;

    async fn save_pending(&self, entry: NewPendingEntry) -> WorkflowResult<PendingReviewEntry>;

    async fn find_pending(&self, id: PendingId) -> WorkflowResult<Option<PendingReviewEntry>>;

    /// Entries still awaiting review, newest first.
    async fn list_pending(&self) -> WorkflowResult<Vec<PendingReviewEntry>>;

    async fn pending_count(&self) -> WorkflowResult<u64>;

    /// Move a pending entry to a terminal status, stamping the reviewer.
    /// Fails with `NotFound` or `AlreadyReviewed`; a terminal entry is
    /// never overwritten.
    async fn transition_pending(
        &self,
        id: PendingId,
        status: ReviewStatus,
        reviewer: UserId,
        at: DateTime<Utc>,
    ) -> WorkflowResult<PendingReviewEntry>;

    /// Approve a pending entry: insert the confirmed event and mark the
    /// entry `Approved` in one atomic unit, so a pending entry can never
    /// end up with a confirmed twin while still claiming to be pending.
    /// Subject to the same alternation conflict rules as
    /// [`save_confirmed`](Self::save_confirmed).
    async fn approve_pending(
        &self,
        id: PendingId,
        event: NewAttendanceEvent,
        reviewer: UserId,
        at: DateTime<Utc>,
    ) -> WorkflowResult<(AttendanceEvent, PendingReviewEntry)>;

    async fn find_event(&self, id: EventId) -> WorkflowResult<Option<AttendanceEvent>>;

    /// Filtered, paginated listing, newest first. The query's station
    /// filter applies to the personnel's station assignment.
    async fn list_events(&self, query: &EventQuery) -> WorkflowResult<Page<AttendanceEvent>>;

    /// Persist an edited event verbatim (modified stamps included).
    async fn update_event(&self, event: &AttendanceEvent) -> WorkflowResult<AttendanceEvent>;

    async fn delete_event(&self, id: EventId) -> WorkflowResult<()>;
}

#[async_trait]
pub trait PersonnelDirectory: Send + Sync {
    /// Station assignment for a personnel member, `None` if the person
    /// does not exist.
    async fn station_of(&self, personnel_id: PersonnelId) -> WorkflowResult<Option<StationId>>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> WorkflowResult<()>;
}
