use super::rules::EligibilitySignals;
use super::EligibilityDetermination;
use crate::workflows::enrollment::{EnrollmentEvent, EnrollmentState};

/// Recommendations only fire when the outstanding flag flips; the enrollment machine
/// re-checks its own guards before acting on them.
pub(crate) fn decide(signals: EligibilitySignals) -> EligibilityDetermination {
    let outstanding = signals.gated && !signals.verification_complete;
    let flipped = outstanding != signals.previously_outstanding;

    let recommended_event = match (flipped, outstanding, signals.enrollment_state) {
        (true, true, EnrollmentState::CoverageSelected | EnrollmentState::CoverageEnrolled) => {
            Some(EnrollmentEvent::MoveToPending)
        }
        (true, false, EnrollmentState::Unverified) => Some(EnrollmentEvent::MoveToEnrolled),
        _ => None,
    };

    EligibilityDetermination {
        outstanding,
        flipped,
        recommended_event,
        blocking_tracks: signals.blocking_tracks,
    }
}
