//! D-Bus surface of the attendance daemon.
//!
//! Bus name: org.muster.Attendance1
//! Object path: /org/muster/Attendance1
//!
//! Requests carry the acting identity as a JSON argument; the bus is a
//! trusted boundary and authentication happens in front of it. Replies
//! are JSON so the schema can grow without re-cutting the interface.

use chrono::{DateTime, Utc};
use muster_core::types::{EventId, PendingId, PersonnelId};
use muster_core::{
    AttendanceKind, AttendanceWorkflow, CaptureRequest, EventPatch, EventQuery, Identity,
    WorkflowError,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use zbus::fdo;
use zbus::interface;

pub struct AttendanceService {
    workflow: Arc<AttendanceWorkflow>,
}

impl AttendanceService {
    pub fn new(workflow: Arc<AttendanceWorkflow>) -> Self {
        Self { workflow }
    }
}

#[interface(name = "org.muster.Attendance1")]
impl AttendanceService {
    /// Run a face capture. `station_id <= 0` means no hint; `kind` may be
    /// empty to let the alternator decide. Returns the capture outcome as
    /// JSON (confirmed event, pending entry, or rejection with confidence).
    async fn capture(
        &self,
        image: String,
        station_id: i64,
        kind: &str,
        identity: &str,
    ) -> fdo::Result<String> {
        let identity = parse_identity(identity)?;
        let requested_kind = parse_optional_kind(kind)?;
        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, actor = identity.actor_id, "capture requested");

        let request = CaptureRequest {
            image,
            station_hint: (station_id > 0).then_some(station_id),
            requested_kind,
        };
        let outcome = self
            .workflow
            .capture(request, &identity)
            .await
            .map_err(to_fdo)?;
        to_json(&outcome)
    }

    /// Record a manual attendance entry. `captured_at` is RFC 3339 and
    /// must not be in the future.
    async fn create_manual(
        &self,
        personnel_id: PersonnelId,
        kind: &str,
        captured_at: &str,
        identity: &str,
    ) -> fdo::Result<String> {
        let identity = parse_identity(identity)?;
        let kind = parse_kind(kind)?;
        let captured_at = parse_timestamp(captured_at)?;
        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, actor = identity.actor_id, personnel_id, "manual entry requested");

        let event = self
            .workflow
            .create_manual(personnel_id, kind, captured_at, &identity)
            .await
            .map_err(to_fdo)?;
        to_json(&event)
    }

    /// List attendance events. `query` is a JSON [`EventQuery`]; pass
    /// `{}` for the default page.
    async fn list_events(&self, query: &str, identity: &str) -> fdo::Result<String> {
        let identity = parse_identity(identity)?;
        let query: EventQuery = serde_json::from_str(query)
            .map_err(|e| fdo::Error::InvalidArgs(format!("bad query: {e}")))?;
        let page = self
            .workflow
            .list_events(query, &identity)
            .await
            .map_err(to_fdo)?;
        to_json(&page)
    }

    async fn get_event(&self, id: EventId, identity: &str) -> fdo::Result<String> {
        let identity = parse_identity(identity)?;
        let event = self.workflow.get_event(id, &identity).await.map_err(to_fdo)?;
        to_json(&event)
    }

    /// Apply a JSON [`EventPatch`] to an event, stamping the modifier.
    async fn edit_event(&self, id: EventId, patch: &str, identity: &str) -> fdo::Result<String> {
        let identity = parse_identity(identity)?;
        let patch: EventPatch = serde_json::from_str(patch)
            .map_err(|e| fdo::Error::InvalidArgs(format!("bad patch: {e}")))?;
        let event = self
            .workflow
            .edit_event(id, patch, &identity)
            .await
            .map_err(to_fdo)?;
        to_json(&event)
    }

    async fn delete_event(&self, id: EventId, identity: &str) -> fdo::Result<()> {
        let identity = parse_identity(identity)?;
        self.workflow
            .delete_event(id, &identity)
            .await
            .map_err(to_fdo)
    }

    async fn list_pending(&self, identity: &str) -> fdo::Result<String> {
        let identity = parse_identity(identity)?;
        let entries = self.workflow.list_pending(&identity).await.map_err(to_fdo)?;
        to_json(&entries)
    }

    async fn pending_count(&self, identity: &str) -> fdo::Result<u64> {
        let identity = parse_identity(identity)?;
        self.workflow.pending_count(&identity).await.map_err(to_fdo)
    }

    /// Promote a pending entry to a confirmed event, with the kind the
    /// alternator expects at approval time.
    async fn approve_pending(&self, id: PendingId, identity: &str) -> fdo::Result<String> {
        let identity = parse_identity(identity)?;
        let event = self
            .workflow
            .approve_pending(id, &identity)
            .await
            .map_err(to_fdo)?;
        to_json(&event)
    }

    async fn reject_pending(&self, id: PendingId, identity: &str) -> fdo::Result<String> {
        let identity = parse_identity(identity)?;
        let entry = self
            .workflow
            .reject_pending(id, &identity)
            .await
            .map_err(to_fdo)?;
        to_json(&entry)
    }

    /// Daemon status information.
    async fn status(&self) -> fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        })
        .to_string())
    }
}

fn parse_identity(raw: &str) -> fdo::Result<Identity> {
    serde_json::from_str(raw).map_err(|e| fdo::Error::InvalidArgs(format!("bad identity: {e}")))
}

fn parse_kind(raw: &str) -> fdo::Result<AttendanceKind> {
    AttendanceKind::parse(raw).ok_or_else(|| {
        fdo::Error::InvalidArgs(format!(
            "bad kind '{raw}'; expected time_in or time_out"
        ))
    })
}

fn parse_optional_kind(raw: &str) -> fdo::Result<Option<AttendanceKind>> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_kind(raw).map(Some)
}

fn parse_timestamp(raw: &str) -> fdo::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| fdo::Error::InvalidArgs(format!("bad timestamp '{raw}': {e}")))
}

fn to_json<T: Serialize>(value: &T) -> fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| fdo::Error::Failed(format!("encoding reply: {e}")))
}

/// Map workflow errors onto D-Bus error names. Client-correctable input
/// becomes InvalidArgs, scope violations become AccessDenied, and the
/// rest keep their message under the generic failure name.
fn to_fdo(err: WorkflowError) -> fdo::Error {
    match err {
        WorkflowError::InvalidInput(_) | WorkflowError::OutOfSequence { .. } => {
            fdo::Error::InvalidArgs(err.to_string())
        }
        WorkflowError::PermissionDenied(_) => fdo::Error::AccessDenied(err.to_string()),
        WorkflowError::ServiceUnavailable(_)
        | WorkflowError::NotFound { .. }
        | WorkflowError::AlreadyReviewed { .. }
        | WorkflowError::AlternationConflict { .. }
        | WorkflowError::Storage(_) => fdo::Error::Failed(err.to_string()),
    }
}
