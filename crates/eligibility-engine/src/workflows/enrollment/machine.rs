use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Enrollment, EnrollmentState};
use crate::clock::ClockSource;

use EnrollmentState::{
    AutoRenewing, Canceled, CoverageEnrolled, CoverageSelected, CoverageTerminationPending,
    Inactive, RenewingCoverageEnrolled, RenewingCoverageSelected, RenewingTransmitted,
    RenewingWaived, Shopping, Terminated, Transmitted, Unverified, Void,
};

/// Events accepted by the enrollment machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EnrollmentEvent {
    SelectCoverage,
    Transmit,
    Effectuate,
    RenewEnrollment,
    RenewWaived,
    BeginCoverage,
    ScheduleTermination { on: NaiveDate },
    RevertTermination,
    Terminate {
        #[serde(default)]
        on: Option<NaiveDate>,
    },
    Cancel,
    Waive,
    MoveToPending,
    MoveToEnrolled,
    Invalidate,
}

impl EnrollmentEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SelectCoverage => "select_coverage",
            Self::Transmit => "transmit",
            Self::Effectuate => "effectuate",
            Self::RenewEnrollment => "renew_enrollment",
            Self::RenewWaived => "renew_waived",
            Self::BeginCoverage => "begin_coverage",
            Self::ScheduleTermination { .. } => "schedule_termination",
            Self::RevertTermination => "revert_termination",
            Self::Terminate { .. } => "terminate",
            Self::Cancel => "cancel",
            Self::Waive => "waive",
            Self::MoveToPending => "move_to_pending",
            Self::MoveToEnrolled => "move_to_enrolled",
            Self::Invalidate => "invalidate",
        }
    }

    pub const fn requires_admin(&self) -> bool {
        matches!(self, Self::Invalidate)
    }
}

/// Outcome of a permitted enrollment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentTransition {
    pub from: EnrollmentState,
    pub to: EnrollmentState,
    pub event: &'static str,
    pub enrollment: Enrollment,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrollmentError {
    #[error("event '{event}' is not permitted from enrollment state '{from}'")]
    InvalidTransition {
        from: EnrollmentState,
        event: &'static str,
    },
    #[error("event '{event}' requires an administrator")]
    AdminRequired { event: &'static str },
}

#[derive(Debug, Clone, Copy)]
enum Guard {
    CanSelectCoverage,
    TerminationOnOrAfterEffective,
    Outstanding,
    NotOutstanding,
    TerminationAttributesCleared,
}

struct GuardContext<'a> {
    enrollment: &'a Enrollment,
    today: NaiveDate,
    termination_on: NaiveDate,
}

impl Guard {
    fn holds(self, ctx: &GuardContext<'_>) -> bool {
        match self {
            Self::CanSelectCoverage => ctx.enrollment.can_select_coverage(ctx.today),
            Self::TerminationOnOrAfterEffective => {
                ctx.termination_on >= ctx.enrollment.effective_on()
            }
            Self::Outstanding => ctx.enrollment.is_outstanding(),
            Self::NotOutstanding => !ctx.enrollment.is_outstanding(),
            Self::TerminationAttributesCleared => ctx.enrollment.termination_attributes_cleared(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Effect {
    RecordTermination,
    ClearTermination,
    CancelFromStart,
}

struct TransitionRule {
    from: &'static [EnrollmentState],
    guards: &'static [Guard],
    to: EnrollmentState,
    effects: &'static [Effect],
}

const NON_TERMINAL: &[EnrollmentState] = &[
    Shopping,
    CoverageSelected,
    Transmitted,
    CoverageEnrolled,
    CoverageTerminationPending,
    Inactive,
    Unverified,
    AutoRenewing,
    RenewingWaived,
    RenewingCoverageSelected,
    RenewingTransmitted,
    RenewingCoverageEnrolled,
];

const SELECT_COVERAGE: &[TransitionRule] = &[
    TransitionRule {
        from: &[Shopping],
        guards: &[Guard::CanSelectCoverage],
        to: CoverageSelected,
        effects: &[],
    },
    TransitionRule {
        from: &[AutoRenewing, RenewingWaived],
        guards: &[Guard::CanSelectCoverage],
        to: RenewingCoverageSelected,
        effects: &[],
    },
];

const TRANSMIT: &[TransitionRule] = &[
    TransitionRule {
        from: &[CoverageSelected],
        guards: &[],
        to: Transmitted,
        effects: &[],
    },
    TransitionRule {
        from: &[AutoRenewing, RenewingCoverageSelected],
        guards: &[],
        to: RenewingTransmitted,
        effects: &[],
    },
];

const EFFECTUATE: &[TransitionRule] = &[
    TransitionRule {
        from: &[Transmitted],
        guards: &[],
        to: CoverageEnrolled,
        effects: &[],
    },
    TransitionRule {
        from: &[RenewingTransmitted],
        guards: &[],
        to: RenewingCoverageEnrolled,
        effects: &[],
    },
];

const RENEW_ENROLLMENT: &[TransitionRule] = &[TransitionRule {
    from: &[Shopping],
    guards: &[],
    to: AutoRenewing,
    effects: &[],
}];

const RENEW_WAIVED: &[TransitionRule] = &[TransitionRule {
    from: &[Shopping],
    guards: &[],
    to: RenewingWaived,
    effects: &[],
}];

const BEGIN_COVERAGE: &[TransitionRule] = &[
    TransitionRule {
        from: &[
            AutoRenewing,
            RenewingCoverageSelected,
            RenewingTransmitted,
            RenewingCoverageEnrolled,
        ],
        guards: &[],
        to: CoverageEnrolled,
        effects: &[],
    },
    TransitionRule {
        from: &[RenewingWaived],
        guards: &[],
        to: Inactive,
        effects: &[],
    },
];

const SCHEDULE_TERMINATION: &[TransitionRule] = &[TransitionRule {
    from: &[
        CoverageSelected,
        Transmitted,
        CoverageEnrolled,
        CoverageTerminationPending,
        RenewingCoverageEnrolled,
    ],
    guards: &[Guard::TerminationOnOrAfterEffective],
    to: CoverageTerminationPending,
    effects: &[Effect::RecordTermination],
}];

const REVERT_TERMINATION: &[TransitionRule] = &[TransitionRule {
    from: &[CoverageTerminationPending],
    guards: &[],
    to: CoverageEnrolled,
    effects: &[Effect::ClearTermination],
}];

const TERMINATE: &[TransitionRule] = &[TransitionRule {
    from: &[
        CoverageTerminationPending,
        CoverageSelected,
        Transmitted,
        CoverageEnrolled,
        Unverified,
        RenewingCoverageEnrolled,
    ],
    guards: &[Guard::TerminationOnOrAfterEffective],
    to: Terminated,
    effects: &[Effect::RecordTermination],
}];

const CANCEL: &[TransitionRule] = &[TransitionRule {
    from: &[
        CoverageSelected,
        Transmitted,
        CoverageEnrolled,
        CoverageTerminationPending,
        Inactive,
        Unverified,
        AutoRenewing,
        RenewingWaived,
        RenewingCoverageSelected,
        RenewingTransmitted,
        RenewingCoverageEnrolled,
    ],
    guards: &[],
    to: Canceled,
    effects: &[Effect::CancelFromStart],
}];

const WAIVE: &[TransitionRule] = &[
    TransitionRule {
        from: &[Shopping, CoverageSelected, CoverageEnrolled],
        guards: &[],
        to: Inactive,
        effects: &[],
    },
    TransitionRule {
        from: &[AutoRenewing],
        guards: &[],
        to: RenewingWaived,
        effects: &[],
    },
];

const MOVE_TO_PENDING: &[TransitionRule] = &[TransitionRule {
    from: &[CoverageSelected, CoverageEnrolled],
    guards: &[Guard::Outstanding],
    to: Unverified,
    effects: &[],
}];

const MOVE_TO_ENROLLED: &[TransitionRule] = &[TransitionRule {
    from: &[Unverified],
    guards: &[Guard::NotOutstanding],
    to: CoverageSelected,
    effects: &[],
}];

const INVALIDATE: &[TransitionRule] = &[TransitionRule {
    from: NON_TERMINAL,
    guards: &[Guard::TerminationAttributesCleared],
    to: Void,
    effects: &[],
}];

fn rules_for(event: &EnrollmentEvent) -> &'static [TransitionRule] {
    match event {
        EnrollmentEvent::SelectCoverage => SELECT_COVERAGE,
        EnrollmentEvent::Transmit => TRANSMIT,
        EnrollmentEvent::Effectuate => EFFECTUATE,
        EnrollmentEvent::RenewEnrollment => RENEW_ENROLLMENT,
        EnrollmentEvent::RenewWaived => RENEW_WAIVED,
        EnrollmentEvent::BeginCoverage => BEGIN_COVERAGE,
        EnrollmentEvent::ScheduleTermination { .. } => SCHEDULE_TERMINATION,
        EnrollmentEvent::RevertTermination => REVERT_TERMINATION,
        EnrollmentEvent::Terminate { .. } => TERMINATE,
        EnrollmentEvent::Cancel => CANCEL,
        EnrollmentEvent::Waive => WAIVE,
        EnrollmentEvent::MoveToPending => MOVE_TO_PENDING,
        EnrollmentEvent::MoveToEnrolled => MOVE_TO_ENROLLED,
        EnrollmentEvent::Invalidate => INVALIDATE,
    }
}

/// Table-driven coverage lifecycle. Terminal states appear in no rule's source list, so
/// nothing leaves `Terminated`, `Canceled` or `Void`.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentStateMachine;

impl EnrollmentStateMachine {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(
        &self,
        current: &Enrollment,
        event: &EnrollmentEvent,
        admin: bool,
        clock: &dyn ClockSource,
    ) -> Result<EnrollmentTransition, EnrollmentError> {
        if event.requires_admin() && !admin {
            return Err(EnrollmentError::AdminRequired {
                event: event.name(),
            });
        }

        let today = clock.today();
        let from = current.state();
        let termination_on = match event {
            EnrollmentEvent::ScheduleTermination { on } => *on,
            EnrollmentEvent::Terminate { on } => on.or(current.terminated_on()).unwrap_or(today),
            _ => today,
        };

        let ctx = GuardContext {
            enrollment: current,
            today,
            termination_on,
        };
        let rule = rules_for(event)
            .iter()
            .find(|rule| rule.from.contains(&from) && rule.guards.iter().all(|g| g.holds(&ctx)))
            .ok_or(EnrollmentError::InvalidTransition {
                from,
                event: event.name(),
            })?;

        let mut next = current.clone();
        for effect in rule.effects {
            match effect {
                Effect::RecordTermination => next.record_termination(termination_on, today),
                Effect::ClearTermination => next.clear_termination(),
                Effect::CancelFromStart => {
                    let effective_on = next.effective_on();
                    next.record_termination(effective_on, today);
                }
            }
        }
        next.set_state(rule.to);

        let changed = next != *current;
        Ok(EnrollmentTransition {
            from,
            to: rule.to,
            event: event.name(),
            enrollment: next,
            changed,
        })
    }
}
