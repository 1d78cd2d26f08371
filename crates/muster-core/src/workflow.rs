//! The attendance workflow.
//!
//! One request-scoped entry point per operation: capture, manual entry,
//! listing and audit-stamped edits, and the pending review lifecycle.
//! All state lives behind the collaborator traits; nothing about the
//! alternation sequence is cached here between calls.

use crate::access::{self, Operation};
use crate::alternation;
use crate::disposition::{self, Route};
use crate::error::{WorkflowError, WorkflowResult};
use crate::image;
use crate::traits::{AuditLog, PersonnelDirectory, RecognizeOutcome, Recognizer, RecordStore};
use crate::types::{
    AttendanceEvent, AttendanceKind, CaptureOutcome, EventId, EventPatch, EventQuery, Identity,
    NewAttendanceEvent, NewAuditEntry, NewPendingEntry, Page, PendingId, PendingReviewEntry,
    PersonnelId, ReviewStatus, Source, StationId, UserId, DEFAULT_PAGE, DEFAULT_PAGE_LIMIT,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Bound on optimistic retries when a concurrent confirmation for the
/// same person invalidates the alternator read.
const MAX_ALTERNATION_RETRIES: u32 = 3;

/// A capture request as it arrives from the transport layer.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Data-URI encoded JPEG or PNG payload.
    pub image: String,
    /// Recognition scope override; honored for admins only.
    pub station_hint: Option<StationId>,
    /// Kind the caller expects to record. Rejected if out of sequence.
    pub requested_kind: Option<AttendanceKind>,
}

pub struct AttendanceWorkflow {
    recognizer: Arc<dyn Recognizer>,
    store: Arc<dyn RecordStore>,
    directory: Arc<dyn PersonnelDirectory>,
    audit: Arc<dyn AuditLog>,
}

impl AttendanceWorkflow {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        store: Arc<dyn RecordStore>,
        directory: Arc<dyn PersonnelDirectory>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            recognizer,
            store,
            directory,
            audit,
        }
    }

    /// Run a face capture end to end: guard the payload, recognize, then
    /// route by confidence into confirmed / pending / rejected.
    pub async fn capture(
        &self,
        request: CaptureRequest,
        identity: &Identity,
    ) -> WorkflowResult<CaptureOutcome> {
        access::authorize(Operation::Capture, identity, None)?;
        image::validate_payload(&request.image)?;
        let station_id = access::capture_scope(identity, request.station_hint)?;

        let (personnel_id, confidence) = match self
            .recognizer
            .recognize(&request.image, station_id)
            .await?
        {
            RecognizeOutcome::Match {
                personnel_id,
                confidence,
            } => (personnel_id, confidence),
            RecognizeOutcome::NoMatch { confidence } => {
                tracing::info!(station_id, confidence, "capture rejected: no match");
                return Ok(CaptureOutcome::Rejected { confidence });
            }
        };

        match disposition::route(confidence) {
            Route::Confirm => {
                let event = self
                    .confirm(
                        personnel_id,
                        request.requested_kind,
                        Some(confidence),
                        Utc::now(),
                        identity.actor_id,
                        Source::Recognition,
                    )
                    .await?;
                tracing::info!(
                    personnel_id,
                    confidence,
                    kind = event.kind.as_str(),
                    "capture confirmed"
                );
                self.record_activity(
                    identity.actor_id,
                    "attendance captured",
                    format!(
                        "personnel #{personnel_id}: {} (confidence {confidence:.3})",
                        event.kind
                    ),
                )
                .await;
                Ok(CaptureOutcome::Confirmed { event })
            }
            Route::Review => {
                let entry = self
                    .store
                    .save_pending(NewPendingEntry {
                        personnel_id,
                        confidence,
                        captured_at: Utc::now(),
                    })
                    .await?;
                tracing::info!(personnel_id, confidence, entry = entry.id, "capture quarantined");
                self.record_activity(
                    identity.actor_id,
                    "capture quarantined",
                    format!("personnel #{personnel_id} held for review (confidence {confidence:.3})"),
                )
                .await;
                Ok(CaptureOutcome::Pending { entry })
            }
            Route::Reject => {
                tracing::info!(personnel_id, confidence, "capture rejected: low confidence");
                Ok(CaptureOutcome::Rejected { confidence })
            }
        }
    }

    /// Record attendance by hand. Bypasses confidence routing entirely
    /// but remains subject to the alternation check and station scoping.
    pub async fn create_manual(
        &self,
        personnel_id: PersonnelId,
        kind: AttendanceKind,
        captured_at: DateTime<Utc>,
        identity: &Identity,
    ) -> WorkflowResult<AttendanceEvent> {
        if captured_at > Utc::now() {
            return Err(WorkflowError::InvalidInput(
                "attendance time cannot be in the future".into(),
            ));
        }

        let station = self.station_of_existing(personnel_id).await?;
        access::authorize(Operation::CreateManual, identity, Some(station))?;

        let event = self
            .confirm(
                personnel_id,
                Some(kind),
                None,
                captured_at,
                identity.actor_id,
                Source::Manual,
            )
            .await?;
        tracing::info!(personnel_id, kind = event.kind.as_str(), "manual entry created");
        self.record_activity(
            identity.actor_id,
            "manual entry created",
            format!("personnel #{personnel_id}: {} at {captured_at}", event.kind),
        )
        .await;
        Ok(event)
    }

    /// Scoped, paginated listing. Station-bound roles always see their
    /// own station, whatever filter they asked for.
    pub async fn list_events(
        &self,
        query: EventQuery,
        identity: &Identity,
    ) -> WorkflowResult<Page<AttendanceEvent>> {
        access::authorize(Operation::ListEvents, identity, None)?;
        let effective = EventQuery {
            page: Some(query.page.unwrap_or(DEFAULT_PAGE).max(1)),
            limit: Some(query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1)),
            station_id: access::visible_station(identity, query.station_id),
            ..query
        };
        self.store.list_events(&effective).await
    }

    pub async fn get_event(
        &self,
        id: EventId,
        identity: &Identity,
    ) -> WorkflowResult<AttendanceEvent> {
        access::authorize(Operation::ReadEvent, identity, None)?;
        let event = self.find_existing_event(id).await?;
        let station = self.directory.station_of(event.personnel_id).await?;
        access::authorize(Operation::ReadEvent, identity, station)?;
        Ok(event)
    }

    /// Apply an edit, stamping the modification audit fields.
    pub async fn edit_event(
        &self,
        id: EventId,
        patch: EventPatch,
        identity: &Identity,
    ) -> WorkflowResult<AttendanceEvent> {
        access::authorize(Operation::EditEvent, identity, None)?;
        let mut event = self.find_existing_event(id).await?;
        let station = self.directory.station_of(event.personnel_id).await?;
        access::authorize(Operation::EditEvent, identity, station)?;

        if let Some(new_personnel) = patch.personnel_id {
            // Reassignment must stay inside the caller's scope too.
            let new_station = self.station_of_existing(new_personnel).await?;
            access::authorize(Operation::EditEvent, identity, Some(new_station))?;
            event.personnel_id = new_personnel;
        }
        if let Some(kind) = patch.kind {
            event.kind = kind;
        }
        event.modified_by = Some(identity.actor_id);
        event.modified_at = Some(Utc::now());

        let updated = self.store.update_event(&event).await?;
        self.record_activity(
            identity.actor_id,
            "attendance record updated",
            format!("event #{id}"),
        )
        .await;
        Ok(updated)
    }

    pub async fn delete_event(&self, id: EventId, identity: &Identity) -> WorkflowResult<()> {
        access::authorize(Operation::DeleteEvent, identity, None)?;
        let event = self.find_existing_event(id).await?;
        self.store.delete_event(id).await?;
        self.record_activity(
            identity.actor_id,
            "attendance record deleted",
            format!("event #{id} (personnel #{})", event.personnel_id),
        )
        .await;
        Ok(())
    }

    pub async fn list_pending(
        &self,
        identity: &Identity,
    ) -> WorkflowResult<Vec<PendingReviewEntry>> {
        access::authorize(Operation::ListPending, identity, None)?;
        self.store.list_pending().await
    }

    pub async fn pending_count(&self, identity: &Identity) -> WorkflowResult<u64> {
        access::authorize(Operation::ListPending, identity, None)?;
        self.store.pending_count().await
    }

    /// Promote a pending entry to a confirmed event. The kind is the one
    /// expected *now*, not the one that would have applied at capture
    /// time; the entry keeps its original confidence and capture time.
    pub async fn approve_pending(
        &self,
        id: PendingId,
        identity: &Identity,
    ) -> WorkflowResult<AttendanceEvent> {
        access::authorize(Operation::Review, identity, None)?;
        let entry = self.find_reviewable_entry(id).await?;

        for attempt in 0..MAX_ALTERNATION_RETRIES {
            let last = self.store.last_confirmed(entry.personnel_id).await?;
            let kind = alternation::next_kind(last.map(|e| e.kind));
            let event = NewAttendanceEvent {
                personnel_id: entry.personnel_id,
                kind,
                confidence: Some(entry.confidence),
                captured_at: entry.captured_at,
                created_by: identity.actor_id,
                source: Source::Recognition,
            };
            match self
                .store
                .approve_pending(id, event, identity.actor_id, Utc::now())
                .await
            {
                Ok((event, _entry)) => {
                    tracing::info!(
                        entry = id,
                        personnel_id = event.personnel_id,
                        kind = event.kind.as_str(),
                        "pending capture approved"
                    );
                    self.record_activity(
                        identity.actor_id,
                        "pending capture approved",
                        format!("entry #{id} confirmed as {}", event.kind),
                    )
                    .await;
                    return Ok(event);
                }
                Err(WorkflowError::AlternationConflict { .. }) => {
                    tracing::debug!(entry = id, attempt, "alternation conflict on approve, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(WorkflowError::AlternationConflict {
            personnel_id: entry.personnel_id,
        })
    }

    /// Archive a pending entry as rejected. No event is created.
    pub async fn reject_pending(
        &self,
        id: PendingId,
        identity: &Identity,
    ) -> WorkflowResult<PendingReviewEntry> {
        access::authorize(Operation::Review, identity, None)?;
        self.find_reviewable_entry(id).await?;
        let entry = self
            .store
            .transition_pending(id, ReviewStatus::Rejected, identity.actor_id, Utc::now())
            .await?;
        tracing::info!(entry = id, "pending capture rejected");
        self.record_activity(
            identity.actor_id,
            "pending capture rejected",
            format!("entry #{id}"),
        )
        .await;
        Ok(entry)
    }

    /// Confirm one event: read the alternator, validate any requested
    /// kind, write, and retry from the top if a concurrent writer got
    /// there first. Exactly one persistence write on success.
    async fn confirm(
        &self,
        personnel_id: PersonnelId,
        requested: Option<AttendanceKind>,
        confidence: Option<f64>,
        captured_at: DateTime<Utc>,
        actor: UserId,
        source: Source,
    ) -> WorkflowResult<AttendanceEvent> {
        for attempt in 0..MAX_ALTERNATION_RETRIES {
            let last = self.store.last_confirmed(personnel_id).await?;
            let expected = alternation::next_kind(last.map(|e| e.kind));
            if let Some(requested) = requested {
                if requested != expected {
                    return Err(WorkflowError::OutOfSequence {
                        requested,
                        expected,
                    });
                }
            }
            let event = NewAttendanceEvent {
                personnel_id,
                kind: expected,
                confidence,
                captured_at,
                created_by: actor,
                source,
            };
            match self.store.save_confirmed(event).await {
                Ok(saved) => return Ok(saved),
                Err(WorkflowError::AlternationConflict { .. }) => {
                    tracing::debug!(personnel_id, attempt, "alternation conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(WorkflowError::AlternationConflict { personnel_id })
    }

    async fn find_existing_event(&self, id: EventId) -> WorkflowResult<AttendanceEvent> {
        self.store
            .find_event(id)
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: "attendance event",
                id,
            })
    }

    async fn find_reviewable_entry(&self, id: PendingId) -> WorkflowResult<PendingReviewEntry> {
        let entry = self
            .store
            .find_pending(id)
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: "pending entry",
                id,
            })?;
        if entry.review_status.is_terminal() {
            return Err(WorkflowError::AlreadyReviewed {
                id,
                status: entry.review_status,
            });
        }
        Ok(entry)
    }

    async fn station_of_existing(&self, personnel_id: PersonnelId) -> WorkflowResult<StationId> {
        self.directory
            .station_of(personnel_id)
            .await?
            .ok_or(WorkflowError::NotFound {
                entity: "personnel",
                id: personnel_id,
            })
    }

    /// Activity log writes never fail an operation that already
    /// committed; a broken log is reported and skipped.
    async fn record_activity(&self, actor_id: UserId, action: &str, detail: String) {
        let entry = NewAuditEntry {
            actor_id,
            action: action.to_string(),
            detail,
            at: Utc::now(),
        };
        if let Err(err) = self.audit.append(entry).await {
            tracing::warn!(error = %err, action, "activity log write failed");
        }
    }
}
