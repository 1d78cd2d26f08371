//! Confidence routing.
//!
//! Maps a recognition confidence onto one of three dispositions. The
//! thresholds are part of the workflow's contract with the review queue
//! and are deliberately not runtime-configurable.

/// Confidence at or above which a recognition is confirmed immediately.
pub const CONFIRM_THRESHOLD: f64 = 0.6;

/// Confidence at or above which a recognition is quarantined for human
/// review. Below this, the capture is rejected outright.
pub const REVIEW_THRESHOLD: f64 = 0.4;

/// Where a recognition-sourced capture goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Persist a confirmed event, subject to the alternation check.
    Confirm,
    /// Persist a pending review entry; no kind is assigned yet.
    Review,
    /// Persist nothing; report the confidence back to the caller.
    Reject,
}

/// Route a confidence score. Both thresholds are inclusive lower bounds.
pub fn route(confidence: f64) -> Route {
    if confidence >= CONFIRM_THRESHOLD {
        Route::Confirm
    } else if confidence >= REVIEW_THRESHOLD {
        Route::Review
    } else {
        Route::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_boundary_is_inclusive() {
        assert_eq!(route(0.6), Route::Confirm);
        assert_eq!(route(0.599_999), Route::Review);
        assert_eq!(route(1.0), Route::Confirm);
    }

    #[test]
    fn review_boundary_is_inclusive() {
        assert_eq!(route(0.4), Route::Review);
        assert_eq!(route(0.399_999), Route::Reject);
    }

    #[test]
    fn near_zero_confidence_rejects() {
        assert_eq!(route(0.0), Route::Reject);
        assert_eq!(route(0.05), Route::Reject);
    }
}
