//! Access scope guard.
//!
//! The whole permission matrix lives here, consulted by every workflow
//! operation, so role rules are never re-derived at call sites. Admins are
//! unrestricted; station users are pinned to their own station; kiosks may
//! only record attendance.

use crate::error::{WorkflowError, WorkflowResult};
use crate::types::{Identity, Role, StationId};

/// Workflow operations subject to role and station scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Capture,
    CreateManual,
    ListEvents,
    ReadEvent,
    EditEvent,
    DeleteEvent,
    ListPending,
    Review,
}

/// Decide whether `identity` may perform `op` against `target_station`.
///
/// `target_station` is the station of the personnel or record being acted
/// on, when known. Passing `None` performs the role-level check only;
/// callers that resolve the station after a lookup call this a second
/// time with the resolved value.
pub fn authorize(
    op: Operation,
    identity: &Identity,
    target_station: Option<StationId>,
) -> WorkflowResult<()> {
    use Operation::*;

    match (op, identity.role) {
        (Capture, _) => Ok(()),

        (CreateManual, Role::Admin) => Ok(()),
        (CreateManual, Role::StationUser | Role::Kiosk) => {
            match (identity.station_id, target_station) {
                (Some(own), Some(target)) if own == target => Ok(()),
                (_, None) => Ok(()),
                _ => Err(WorkflowError::PermissionDenied(
                    "manual entries are limited to your own station's personnel".into(),
                )),
            }
        }

        // Kiosks are capture-only beyond this point, whatever the operation.
        (_, Role::Kiosk) => Err(WorkflowError::PermissionDenied(
            "kiosk principals may only record attendance".into(),
        )),

        (ListEvents | ReadEvent | EditEvent, Role::Admin) => Ok(()),
        (ListEvents, Role::StationUser) => Ok(()),
        (ReadEvent | EditEvent, Role::StationUser) => {
            match (identity.station_id, target_station) {
                (_, None) => Ok(()),
                (Some(own), Some(target)) if own == target => Ok(()),
                _ => Err(WorkflowError::PermissionDenied(
                    "attendance records outside your station are not accessible".into(),
                )),
            }
        }

        (DeleteEvent, Role::Admin) => Ok(()),
        (DeleteEvent, Role::StationUser) => Err(WorkflowError::PermissionDenied(
            "only administrators may delete attendance records".into(),
        )),

        (ListPending | Review, Role::Admin) => Ok(()),
        (ListPending | Review, Role::StationUser) => Err(WorkflowError::PermissionDenied(
            "only administrators may review pending captures".into(),
        )),
    }
}

/// The station filter a listing must actually run with. Station-bound
/// roles always see their own station; a filter they supply for another
/// station is overridden, not honored.
pub fn visible_station(
    identity: &Identity,
    requested: Option<StationId>,
) -> Option<StationId> {
    match identity.role {
        Role::Admin => requested,
        Role::StationUser | Role::Kiosk => identity.station_id,
    }
}

/// The recognition scope for a capture. Station-bound roles always scan
/// within their own station; admins may pass an explicit hint.
pub fn capture_scope(
    identity: &Identity,
    hint: Option<StationId>,
) -> WorkflowResult<StationId> {
    let scope = match identity.role {
        Role::Admin => hint.or(identity.station_id),
        Role::StationUser | Role::Kiosk => identity.station_id,
    };
    scope.ok_or_else(|| {
        WorkflowError::InvalidInput("no station scope available for capture".into())
    })
}
