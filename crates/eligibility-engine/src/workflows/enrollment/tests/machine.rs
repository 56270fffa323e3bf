use super::common::*;
use crate::workflows::enrollment::{
    Enrollment, EnrollmentError, EnrollmentEvent, EnrollmentId, EnrollmentKind, EnrollmentState,
    EnrollmentStateMachine,
};

fn every_event() -> Vec<EnrollmentEvent> {
    vec![
        EnrollmentEvent::SelectCoverage,
        EnrollmentEvent::Transmit,
        EnrollmentEvent::Effectuate,
        EnrollmentEvent::RenewEnrollment,
        EnrollmentEvent::RenewWaived,
        EnrollmentEvent::BeginCoverage,
        EnrollmentEvent::ScheduleTermination {
            on: date(2025, 6, 30),
        },
        EnrollmentEvent::RevertTermination,
        EnrollmentEvent::Terminate {
            on: Some(date(2025, 6, 30)),
        },
        EnrollmentEvent::Cancel,
        EnrollmentEvent::Waive,
        EnrollmentEvent::MoveToPending,
        EnrollmentEvent::MoveToEnrolled,
        EnrollmentEvent::Invalidate,
    ]
}

#[test]
fn individual_enrollment_reaches_coverage_enrolled() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let enrolled = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[
            EnrollmentEvent::SelectCoverage,
            EnrollmentEvent::Transmit,
            EnrollmentEvent::Effectuate,
        ],
    );
    assert_eq!(enrolled.state(), EnrollmentState::CoverageEnrolled);
}

#[test]
fn employer_sponsored_selection_requires_an_open_window() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();

    let without_window = enrollment(EnrollmentKind::EmployerSponsored);
    let err = machine
        .apply(&without_window, &EnrollmentEvent::SelectCoverage, false, &clock)
        .expect_err("no eligible window");
    assert_eq!(
        err,
        EnrollmentError::InvalidTransition {
            from: EnrollmentState::Shopping,
            event: "select_coverage",
        }
    );

    let with_window =
        enrollment(EnrollmentKind::EmployerSponsored).with_windows(vec![open_enrollment_window()]);
    let selected = machine
        .apply(&with_window, &EnrollmentEvent::SelectCoverage, false, &clock)
        .expect("window open today");
    assert_eq!(selected.to, EnrollmentState::CoverageSelected);

    clock.set(
        date(2025, 2, 15)
            .and_hms_opt(9, 0, 0)
            .expect("valid time")
            .and_utc(),
    );
    assert!(machine
        .apply(&with_window, &EnrollmentEvent::SelectCoverage, false, &clock)
        .is_err());
}

#[test]
fn cobra_and_coverall_ignore_enrollment_windows() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    for kind in [EnrollmentKind::EmployerSponsoredCobra, EnrollmentKind::Coverall] {
        let selected = machine
            .apply(&enrollment(kind), &EnrollmentEvent::SelectCoverage, false, &clock)
            .expect("always selectable");
        assert_eq!(selected.to, EnrollmentState::CoverageSelected);
    }
}

#[test]
fn schedule_termination_records_dates_and_can_be_reverted() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let enrolled = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[
            EnrollmentEvent::SelectCoverage,
            EnrollmentEvent::Transmit,
            EnrollmentEvent::Effectuate,
        ],
    );

    let too_early = machine.apply(
        &enrolled,
        &EnrollmentEvent::ScheduleTermination {
            on: date(2025, 1, 20),
        },
        false,
        &clock,
    );
    assert!(matches!(
        too_early,
        Err(EnrollmentError::InvalidTransition { .. })
    ));

    let pending = machine
        .apply(
            &enrolled,
            &EnrollmentEvent::ScheduleTermination {
                on: date(2025, 5, 31),
            },
            false,
            &clock,
        )
        .expect("termination after effective date");
    assert_eq!(pending.to, EnrollmentState::CoverageTerminationPending);
    assert_eq!(pending.enrollment.terminated_on(), Some(date(2025, 5, 31)));
    assert_eq!(
        pending.enrollment.termination_submitted_on(),
        Some(date(2025, 1, 10))
    );

    let reverted = machine
        .apply(
            &pending.enrollment,
            &EnrollmentEvent::RevertTermination,
            false,
            &clock,
        )
        .expect("revert termination");
    assert_eq!(reverted.to, EnrollmentState::CoverageEnrolled);
    assert!(reverted.enrollment.termination_attributes_cleared());
}

#[test]
fn scheduled_termination_date_is_used_when_terminating() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let pending = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[
            EnrollmentEvent::SelectCoverage,
            EnrollmentEvent::ScheduleTermination {
                on: date(2025, 4, 30),
            },
        ],
    );

    let terminated = machine
        .apply(
            &pending,
            &EnrollmentEvent::Terminate { on: None },
            false,
            &clock,
        )
        .expect("terminate pending coverage");
    assert_eq!(terminated.to, EnrollmentState::Terminated);
    assert_eq!(terminated.enrollment.terminated_on(), Some(date(2025, 4, 30)));
}

#[test]
fn cancel_ends_coverage_on_its_effective_date() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let selected = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[EnrollmentEvent::SelectCoverage],
    );

    let canceled = machine
        .apply(&selected, &EnrollmentEvent::Cancel, false, &clock)
        .expect("cancel selected coverage");
    assert_eq!(canceled.to, EnrollmentState::Canceled);
    assert_eq!(canceled.enrollment.terminated_on(), Some(date(2025, 2, 1)));

    let shopping = enrollment(EnrollmentKind::Individual);
    assert!(machine
        .apply(&shopping, &EnrollmentEvent::Cancel, false, &clock)
        .is_err());
}

#[test]
fn terminal_states_refuse_every_event() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let selected = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[EnrollmentEvent::SelectCoverage],
    );

    let canceled = drive(&machine, &clock, selected.clone(), &[EnrollmentEvent::Cancel]);
    let terminated = drive(
        &machine,
        &clock,
        selected,
        &[EnrollmentEvent::Terminate {
            on: Some(date(2025, 3, 31)),
        }],
    );
    let void = machine
        .apply(
            &enrollment(EnrollmentKind::Individual),
            &EnrollmentEvent::Invalidate,
            true,
            &clock,
        )
        .expect("admin invalidates shopping enrollment")
        .enrollment;

    for terminal in [canceled, terminated, void] {
        assert!(terminal.state().is_terminal());
        for event in every_event() {
            let outcome = machine.apply(&terminal, &event, true, &clock);
            assert!(
                matches!(outcome, Err(EnrollmentError::InvalidTransition { .. })),
                "{} left {}",
                event.name(),
                terminal.state()
            );
        }
    }
}

#[test]
fn invalidate_requires_admin_and_cleared_termination() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let pending = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[
            EnrollmentEvent::SelectCoverage,
            EnrollmentEvent::ScheduleTermination {
                on: date(2025, 4, 30),
            },
        ],
    );

    assert_eq!(
        machine.apply(&pending, &EnrollmentEvent::Invalidate, false, &clock),
        Err(EnrollmentError::AdminRequired {
            event: "invalidate"
        })
    );
    assert!(matches!(
        machine.apply(&pending, &EnrollmentEvent::Invalidate, true, &clock),
        Err(EnrollmentError::InvalidTransition { .. })
    ));
}

#[test]
fn renewal_branch_runs_to_coverage_enrolled() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let renewed = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[
            EnrollmentEvent::RenewEnrollment,
            EnrollmentEvent::SelectCoverage,
            EnrollmentEvent::Transmit,
            EnrollmentEvent::Effectuate,
        ],
    );
    assert_eq!(renewed.state(), EnrollmentState::RenewingCoverageEnrolled);

    let begun = drive(&machine, &clock, renewed, &[EnrollmentEvent::BeginCoverage]);
    assert_eq!(begun.state(), EnrollmentState::CoverageEnrolled);
}

#[test]
fn waived_renewal_becomes_inactive() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let inactive = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[
            EnrollmentEvent::RenewEnrollment,
            EnrollmentEvent::Waive,
            EnrollmentEvent::BeginCoverage,
        ],
    );
    assert_eq!(inactive.state(), EnrollmentState::Inactive);
}

#[test]
fn pending_moves_follow_the_outstanding_flag() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let mut selected = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[EnrollmentEvent::SelectCoverage],
    );

    assert!(machine
        .apply(&selected, &EnrollmentEvent::MoveToPending, false, &clock)
        .is_err());

    selected.set_outstanding(true);
    let mut pending = machine
        .apply(&selected, &EnrollmentEvent::MoveToPending, false, &clock)
        .expect("outstanding enrollment moves to pending")
        .enrollment;
    assert_eq!(pending.state(), EnrollmentState::Unverified);

    assert!(machine
        .apply(&pending, &EnrollmentEvent::MoveToEnrolled, false, &clock)
        .is_err());
    pending.set_outstanding(false);
    let restored = machine
        .apply(&pending, &EnrollmentEvent::MoveToEnrolled, false, &clock)
        .expect("cleared enrollment returns to selected");
    assert_eq!(restored.to, EnrollmentState::CoverageSelected);
}

#[test]
fn reinstatement_links_a_new_enrollment_to_a_terminated_one() {
    let machine = EnrollmentStateMachine::new();
    let clock = clock();
    let selected = drive(
        &machine,
        &clock,
        enrollment(EnrollmentKind::Individual),
        &[EnrollmentEvent::SelectCoverage],
    );
    assert!(Enrollment::reinstatement_of(&selected, EnrollmentId("next".to_string())).is_err());

    let canceled = drive(&machine, &clock, selected, &[EnrollmentEvent::Cancel]);
    let reinstated = Enrollment::reinstatement_of(&canceled, EnrollmentId("next".to_string()))
        .expect("canceled enrollments can be reinstated");

    assert_eq!(reinstated.state(), EnrollmentState::CoverageSelected);
    assert_eq!(reinstated.predecessor_id(), Some(canceled.id()));
    assert_eq!(reinstated.consumer_id(), canceled.consumer_id());
    assert_eq!(canceled.state(), EnrollmentState::Canceled);
}
