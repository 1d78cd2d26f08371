use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Personnel row id in the directory.
pub type PersonnelId = i64;
/// Station id a personnel member or acting user is assigned to.
pub type StationId = i64;
/// Acting user id (the authenticated principal, not personnel).
pub type UserId = i64;
/// Attendance event row id.
pub type EventId = i64;
/// Pending review entry row id.
pub type PendingId = i64;

/// Direction of an attendance event. Confirmed events for one person
/// strictly alternate, starting with `TimeIn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceKind {
    TimeIn,
    TimeOut,
}

impl AttendanceKind {
    /// The kind that must follow this one in a person's confirmed sequence.
    pub fn complement(self) -> Self {
        match self {
            AttendanceKind::TimeIn => AttendanceKind::TimeOut,
            AttendanceKind::TimeOut => AttendanceKind::TimeIn,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceKind::TimeIn => "time_in",
            AttendanceKind::TimeOut => "time_out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "time_in" => Some(AttendanceKind::TimeIn),
            "time_out" => Some(AttendanceKind::TimeOut),
            _ => None,
        }
    }
}

impl fmt::Display for AttendanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceKind::TimeIn => write!(f, "time in"),
            AttendanceKind::TimeOut => write!(f, "time out"),
        }
    }
}

/// How an attendance event entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Recognition,
    Manual,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Recognition => "recognition",
            Source::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "recognition" => Some(Source::Recognition),
            "manual" => Some(Source::Manual),
            _ => None,
        }
    }
}

/// Final state of an attendance event. Only `Confirmed` events are ever
/// persisted; `Rejected` exists so callers of capture see an exhaustive
/// outcome rather than a stringly-typed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Confirmed,
    PendingReview,
    Rejected,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Confirmed => "confirmed",
            Disposition::PendingReview => "pending_review",
            Disposition::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(Disposition::Confirmed),
            "pending_review" => Some(Disposition::PendingReview),
            "rejected" => Some(Disposition::Rejected),
            _ => None,
        }
    }
}

/// Review state of a quarantined capture. Transitions exactly once,
/// from `Pending` to either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted attendance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: EventId,
    pub personnel_id: PersonnelId,
    pub kind: AttendanceKind,
    pub disposition: Disposition,
    /// Recognition confidence in [0, 1]. Absent for manual entries.
    pub confidence: Option<f64>,
    /// When the event logically occurred. Submission time for captures,
    /// caller-supplied (never in the future) for manual entries.
    pub captured_at: DateTime<Utc>,
    pub created_by: UserId,
    pub modified_by: Option<UserId>,
    pub modified_at: Option<DateTime<Utc>>,
    pub source: Source,
}

/// Fields for a confirmed event about to be persisted. The id and the
/// `Confirmed` disposition are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAttendanceEvent {
    pub personnel_id: PersonnelId,
    pub kind: AttendanceKind,
    pub confidence: Option<f64>,
    pub captured_at: DateTime<Utc>,
    pub created_by: UserId,
    pub source: Source,
}

/// A medium-confidence capture held for human review. Carries no kind:
/// the kind is computed at promotion time, because the person's confirmed
/// sequence may move on while the entry sits in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReviewEntry {
    pub id: PendingId,
    pub personnel_id: PersonnelId,
    pub confidence: f64,
    pub captured_at: DateTime<Utc>,
    pub review_status: ReviewStatus,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Fields for a pending entry about to be persisted.
#[derive(Debug, Clone)]
pub struct NewPendingEntry {
    pub personnel_id: PersonnelId,
    pub confidence: f64,
    pub captured_at: DateTime<Utc>,
}

/// Caller role. The full permission matrix lives in [`crate::access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    StationUser,
    Kiosk,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::StationUser => "station_user",
            Role::Kiosk => "kiosk",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "station_user" => Some(Role::StationUser),
            "kiosk" => Some(Role::Kiosk),
            _ => None,
        }
    }
}

/// The authenticated principal behind one workflow call. Supplied per
/// call and never cached across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub actor_id: UserId,
    pub role: Role,
    pub station_id: Option<StationId>,
}

/// Result of a capture request. Exactly one of the three arms; rejection
/// is a normal outcome, not an error, so the caller can surface the
/// confidence as actionable feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum CaptureOutcome {
    Confirmed { event: AttendanceEvent },
    Pending { entry: PendingReviewEntry },
    Rejected { confidence: f64 },
}

/// Listing filters. `station_id` is advisory: the access guard overrides
/// it with the caller's own station for station-bound roles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub personnel_id: Option<PersonnelId>,
    pub station_id: Option<StationId>,
    pub kind: Option<AttendanceKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// One page of a scoped listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

/// Partial update for a confirmed event. Applying any patch stamps
/// `modified_by` / `modified_at`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    pub kind: Option<AttendanceKind>,
    pub personnel_id: Option<PersonnelId>,
}

/// One activity log line, appended after each successful mutation.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor_id: UserId,
    pub action: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_complement_alternates() {
        assert_eq!(AttendanceKind::TimeIn.complement(), AttendanceKind::TimeOut);
        assert_eq!(AttendanceKind::TimeOut.complement(), AttendanceKind::TimeIn);
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [AttendanceKind::TimeIn, AttendanceKind::TimeOut] {
            assert_eq!(AttendanceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(AttendanceKind::parse("lunch"), None);
    }

    #[test]
    fn review_status_terminality() {
        assert!(!ReviewStatus::Pending.is_terminal());
        assert!(ReviewStatus::Approved.is_terminal());
        assert!(ReviewStatus::Rejected.is_terminal());
    }

    #[test]
    fn role_parse_rejects_unknown() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("station_user"), Some(Role::StationUser));
        assert_eq!(Role::parse("kiosk"), Some(Role::Kiosk));
        assert_eq!(Role::parse("root"), None);
    }
}
