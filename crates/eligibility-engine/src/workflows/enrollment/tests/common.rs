use chrono::NaiveDate;

use crate::clock::FixedClock;
use crate::workflows::enrollment::{
    Enrollment, EnrollmentEvent, EnrollmentId, EnrollmentKind, EnrollmentStateMachine,
    EnrollmentWindow, EnrollmentWindowKind,
};
use crate::workflows::verification::ConsumerId;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn clock() -> FixedClock {
    FixedClock::on(date(2025, 1, 10))
}

pub(super) fn enrollment(kind: EnrollmentKind) -> Enrollment {
    Enrollment::new(
        EnrollmentId("enrollment-test".to_string()),
        ConsumerId("consumer-test".to_string()),
        kind,
        date(2025, 2, 1),
    )
}

pub(super) fn open_enrollment_window() -> EnrollmentWindow {
    EnrollmentWindow {
        kind: EnrollmentWindowKind::OpenEnrollment,
        opens_on: date(2024, 11, 1),
        closes_on: date(2025, 1, 31),
        effective_from: date(2025, 1, 1),
        effective_until: date(2025, 12, 31),
    }
}

/// Drive an enrollment through the given events, panicking on the first refusal.
pub(super) fn drive(
    machine: &EnrollmentStateMachine,
    clock: &FixedClock,
    start: Enrollment,
    events: &[EnrollmentEvent],
) -> Enrollment {
    events.iter().fold(start, |current, event| {
        machine
            .apply(&current, event, false, clock)
            .unwrap_or_else(|err| panic!("{} refused: {err}", event.name()))
            .enrollment
    })
}
