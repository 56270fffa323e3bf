use super::config::EligibilityConfig;
use crate::workflows::enrollment::{Enrollment, EnrollmentState};
use crate::workflows::verification::{
    ConsumerVerification, ConsumerVerificationState, VerificationTrack,
};

pub(crate) struct EligibilitySignals {
    pub gated: bool,
    pub verification_complete: bool,
    pub previously_outstanding: bool,
    pub enrollment_state: EnrollmentState,
    pub blocking_tracks: Vec<VerificationTrack>,
}

/// Verification counts as complete when fully verified, or SCI verified with every
/// track individually verified.
fn verification_complete(verification: &ConsumerVerification) -> bool {
    match verification.state() {
        ConsumerVerificationState::FullyVerified => true,
        ConsumerVerificationState::SciVerified => verification.ledger().all_tracks_verified(),
        _ => false,
    }
}

pub(crate) fn collect_signals(
    verification: &ConsumerVerification,
    enrollment: &Enrollment,
    config: &EligibilityConfig,
) -> EligibilitySignals {
    let gated = config.gates(enrollment.kind());
    let verification_complete = verification_complete(verification);
    let blocking_tracks = if gated && !verification_complete {
        verification.ledger().unresolved_tracks()
    } else {
        Vec::new()
    };

    EligibilitySignals {
        gated,
        verification_complete,
        previously_outstanding: enrollment.is_outstanding(),
        enrollment_state: enrollment.state(),
        blocking_tracks,
    }
}
