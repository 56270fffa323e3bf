//! Keeps enrollment eligibility consistent with the owning consumer's verification.

mod config;
mod policy;
mod rules;

pub use config::EligibilityConfig;

use serde::Serialize;

use crate::workflows::enrollment::{Enrollment, EnrollmentEvent};
use crate::workflows::verification::{ConsumerVerification, VerificationTrack};
use policy::decide;

/// Stateless evaluator applying the gating configuration to one enrollment.
#[derive(Debug, Clone, Default)]
pub struct EligibilityEvaluator {
    config: EligibilityConfig,
}

impl EligibilityEvaluator {
    pub fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        verification: &ConsumerVerification,
        enrollment: &Enrollment,
    ) -> EligibilityDetermination {
        let signals = rules::collect_signals(verification, enrollment, &self.config);
        decide(signals)
    }
}

/// Evaluator output for one enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityDetermination {
    pub outstanding: bool,
    /// Whether `outstanding` differs from the flag currently stored on the enrollment.
    pub flipped: bool,
    pub recommended_event: Option<EnrollmentEvent>,
    pub blocking_tracks: Vec<VerificationTrack>,
}
