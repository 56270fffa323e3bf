use serde::{Deserialize, Serialize};

use crate::workflows::enrollment::EnrollmentKind;

/// Which enrollment kinds are gated by the owning consumer's verification outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    pub gated_kinds: Vec<EnrollmentKind>,
}

impl EligibilityConfig {
    pub fn gates(&self, kind: EnrollmentKind) -> bool {
        self.gated_kinds.contains(&kind)
    }
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            gated_kinds: vec![EnrollmentKind::Individual, EnrollmentKind::Coverall],
        }
    }
}
