//! Per-enrollment coverage lifecycle.

pub mod domain;
pub mod machine;

#[cfg(test)]
mod tests;

pub use domain::{
    Enrollment, EnrollmentId, EnrollmentKind, EnrollmentState, EnrollmentWindow,
    EnrollmentWindowKind, ReinstatementError,
};
pub use machine::{EnrollmentError, EnrollmentEvent, EnrollmentStateMachine, EnrollmentTransition};
