//! Attendance type alternation.
//!
//! A person's confirmed events must read `TimeIn, TimeOut, TimeIn, ...`
//! when ordered by capture time. The next expected kind is derived purely
//! from the most recent confirmed event, so the decision can be unit
//! tested against an event snapshot without touching storage.

use crate::types::{AttendanceEvent, AttendanceKind, Disposition};

/// The kind the next confirmed event must have, given the kind of the most
/// recent confirmed event. A person with no confirmed history starts with
/// `TimeIn`.
pub fn next_kind(last_confirmed: Option<AttendanceKind>) -> AttendanceKind {
    match last_confirmed {
        None => AttendanceKind::TimeIn,
        Some(kind) => kind.complement(),
    }
}

/// The kind of the most recent confirmed event in `events`, ordered by
/// `captured_at` and tie-broken by `id` (insertion order) when capture
/// timestamps collide. Non-confirmed events are ignored.
pub fn last_confirmed_kind(events: &[AttendanceEvent]) -> Option<AttendanceKind> {
    events
        .iter()
        .filter(|e| e.disposition == Disposition::Confirmed)
        .max_by(|a, b| {
            a.captured_at
                .cmp(&b.captured_at)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|e| e.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttendanceEvent, Source};
    use chrono::{Duration, Utc};

    fn event(id: i64, kind: AttendanceKind, offset_secs: i64) -> AttendanceEvent {
        AttendanceEvent {
            id,
            personnel_id: 1,
            kind,
            disposition: Disposition::Confirmed,
            confidence: Some(0.9),
            captured_at: Utc::now() + Duration::seconds(offset_secs),
            created_by: 1,
            modified_by: None,
            modified_at: None,
            source: Source::Recognition,
        }
    }

    #[test]
    fn first_event_is_time_in() {
        assert_eq!(next_kind(None), AttendanceKind::TimeIn);
    }

    #[test]
    fn next_kind_alternates() {
        assert_eq!(
            next_kind(Some(AttendanceKind::TimeIn)),
            AttendanceKind::TimeOut
        );
        assert_eq!(
            next_kind(Some(AttendanceKind::TimeOut)),
            AttendanceKind::TimeIn
        );
    }

    #[test]
    fn last_confirmed_kind_orders_by_capture_time() {
        let events = vec![
            event(1, AttendanceKind::TimeIn, 0),
            event(2, AttendanceKind::TimeOut, 60),
            event(3, AttendanceKind::TimeIn, 120),
        ];
        assert_eq!(last_confirmed_kind(&events), Some(AttendanceKind::TimeIn));
    }

    #[test]
    fn colliding_timestamps_tie_break_on_id() {
        let at = Utc::now();
        let mut a = event(7, AttendanceKind::TimeIn, 0);
        let mut b = event(8, AttendanceKind::TimeOut, 0);
        a.captured_at = at;
        b.captured_at = at;
        assert_eq!(
            last_confirmed_kind(&[a, b]),
            Some(AttendanceKind::TimeOut),
            "higher id wins at equal captured_at"
        );
    }

    #[test]
    fn non_confirmed_events_are_ignored() {
        let mut rejected = event(9, AttendanceKind::TimeOut, 300);
        rejected.disposition = Disposition::Rejected;
        let events = vec![event(1, AttendanceKind::TimeIn, 0), rejected];
        assert_eq!(last_confirmed_kind(&events), Some(AttendanceKind::TimeIn));
    }

    #[test]
    fn empty_history_has_no_last_kind() {
        assert_eq!(last_confirmed_kind(&[]), None);
    }
}
