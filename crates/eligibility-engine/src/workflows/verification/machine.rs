use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ConsumerVerificationState, Identity, LawfulPresenceResult, ResidencyOutcome,
    ResidencyStatus, TrackStatus, VerificationAuthority, VerificationTrack,
};
use super::integrity::{check_ledger, LedgerViolation};
use super::ledger::{VerificationLedger, NO_SSN_FOR_NATIVE};
use crate::clock::ClockSource;
use crate::config::WorkflowConfig;

use ConsumerVerificationState::{
    DhsPending, FullyVerified, SciVerified, SsaPending, Unverified, VerificationOutstanding,
    VerificationPeriodEnded,
};

/// Consumer aggregate: identity snapshot, lifecycle state and verification ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerVerification {
    identity: Identity,
    state: ConsumerVerificationState,
    ledger: VerificationLedger,
    outstanding_since: Option<NaiveDate>,
}

impl ConsumerVerification {
    pub fn register(identity: Identity, residency: ResidencyStatus) -> Self {
        let ledger = VerificationLedger::for_identity(&identity, residency);
        Self {
            identity,
            state: Unverified,
            ledger,
            outstanding_since: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> ConsumerVerificationState {
        self.state
    }

    pub fn ledger(&self) -> &VerificationLedger {
        &self.ledger
    }

    pub fn outstanding_since(&self) -> Option<NaiveDate> {
        self.outstanding_since
    }

    /// Date on which an outstanding consumer's verification period ends.
    pub fn verification_due_on(&self, period_days: u32) -> Option<NaiveDate> {
        self.outstanding_since
            .and_then(|since| since.checked_add_days(Days::new(u64::from(period_days))))
    }

    /// Swap in a new identity snapshot and re-derive the identity-dependent ledger fields.
    pub(crate) fn with_identity(&self, identity: Identity) -> Result<Self, LedgerViolation> {
        let mut next = self.clone();
        next.ledger.refresh_derived(&identity, "sensitive_field_changed");
        next.identity = identity;
        check_ledger(&next.identity, &next.ledger)?;
        Ok(next)
    }
}

/// Events accepted by the consumer verification machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VerificationEvent {
    CoveragePurchased {
        residency_known: bool,
    },
    SsnResponse {
        valid: bool,
        #[serde(default)]
        citizenship: Option<bool>,
    },
    SsnAndCitizenshipValid,
    DhsResponse {
        authorized: bool,
        #[serde(default)]
        document_ref: Option<String>,
    },
    ResidencyResult {
        outcome: ResidencyOutcome,
    },
    Reject {
        track: VerificationTrack,
        reason: String,
    },
    Revert {
        reason: String,
    },
    AdminVerify {
        track: VerificationTrack,
        reason: String,
    },
    VerificationPeriodExpired,
    Import,
}

impl VerificationEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CoveragePurchased { .. } => "coverage_purchased",
            Self::SsnResponse { .. } => "ssn_response",
            Self::SsnAndCitizenshipValid => "ssn_and_citizenship_valid",
            Self::DhsResponse { .. } => "dhs_response",
            Self::ResidencyResult { .. } => "residency_result",
            Self::Reject { .. } => "reject",
            Self::Revert { .. } => "revert",
            Self::AdminVerify { .. } => "admin_verify",
            Self::VerificationPeriodExpired => "verification_period_expired",
            Self::Import => "import",
        }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::Reject { .. } | Self::Revert { .. } | Self::AdminVerify { .. }
        )
    }

    fn reason(&self) -> &str {
        match self {
            Self::Reject { reason, .. }
            | Self::Revert { reason }
            | Self::AdminVerify { reason, .. } => reason,
            other => other.name(),
        }
    }
}

/// Side-effect request produced by a transition; delivered by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationIntent {
    RequestSsa,
    RequestDhs,
    RequestResidency,
}

impl VerificationIntent {
    pub const fn authority(self) -> VerificationAuthority {
        match self {
            Self::RequestSsa => VerificationAuthority::Ssa,
            Self::RequestDhs => VerificationAuthority::Dhs,
            Self::RequestResidency => VerificationAuthority::LocalResidency,
        }
    }
}

/// Outcome of a permitted verification event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTransition {
    pub from: ConsumerVerificationState,
    pub to: ConsumerVerificationState,
    pub event: &'static str,
    pub verification: ConsumerVerification,
    pub intents: Vec<VerificationIntent>,
    /// False when the event was a replay that left state and ledger untouched.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("event '{event}' is not permitted from verification state '{from}'")]
    InvalidTransition {
        from: ConsumerVerificationState,
        event: &'static str,
    },
    #[error(transparent)]
    InconsistentLedger(#[from] LedgerViolation),
}

#[derive(Debug, Clone, Copy)]
enum Guard {
    NativeWithoutSsn,
    NoSsnNonNative,
    HasSsnOrNative,
    Native,
    NonNative,
    ResidencyDenied,
    ResidencyPending,
    ResidencyVerified,
    NoSciRejection,
    SciSatisfied,
    AllTracksVerified,
    VerificationPeriodElapsed,
}

struct GuardContext<'a> {
    verification: &'a ConsumerVerification,
    today: NaiveDate,
    period_days: u32,
}

impl Guard {
    fn holds(self, ctx: &GuardContext<'_>) -> bool {
        let identity = &ctx.verification.identity;
        let ledger = &ctx.verification.ledger;
        match self {
            Self::NativeWithoutSsn => identity.is_native() && !identity.has_ssn(),
            Self::NoSsnNonNative => !identity.has_ssn() && !identity.is_native(),
            Self::HasSsnOrNative => identity.has_ssn() || identity.is_native(),
            Self::Native => identity.is_native(),
            Self::NonNative => !identity.is_native(),
            Self::ResidencyDenied => ledger.residency_status().is_denied(),
            Self::ResidencyPending => {
                ledger.residency_status().is_pending()
                    && !ledger.is_rejected(VerificationTrack::Residency)
            }
            Self::ResidencyVerified => ledger.residency_verified(),
            Self::NoSciRejection => {
                !ledger.is_rejected(VerificationTrack::Ssn)
                    && !ledger.is_rejected(VerificationTrack::LawfulPresence)
            }
            Self::SciSatisfied => ledger.ssn_satisfied() && ledger.citizenship_satisfied(),
            Self::AllTracksVerified => ledger.all_tracks_verified(),
            Self::VerificationPeriodElapsed => ctx
                .verification
                .verification_due_on(ctx.period_days)
                .is_some_and(|due| due <= ctx.today),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    To(ConsumerVerificationState),
    Stay,
}

#[derive(Debug, Clone, Copy)]
enum Effect {
    FlagSsnForNative,
    PassSsn,
    FailSsn,
    PassLawfulPresence(Option<VerificationAuthority>),
    FailLawfulPresence(VerificationAuthority),
    PassNative,
    PassResidency,
    ResetToDefaults,
    Request(VerificationIntent),
}

struct TransitionRule {
    from: &'static [ConsumerVerificationState],
    guards: &'static [Guard],
    to: Target,
    effects: &'static [Effect],
}

const ANY_STATE: &[ConsumerVerificationState] = &[
    Unverified,
    SsaPending,
    DhsPending,
    VerificationOutstanding,
    SciVerified,
    FullyVerified,
    VerificationPeriodEnded,
];

const COVERAGE_PURCHASED: &[TransitionRule] = &[
    TransitionRule {
        from: &[Unverified],
        guards: &[Guard::NativeWithoutSsn],
        to: Target::To(VerificationOutstanding),
        effects: &[Effect::FlagSsnForNative],
    },
    TransitionRule {
        from: &[Unverified],
        guards: &[Guard::NoSsnNonNative],
        to: Target::To(DhsPending),
        effects: &[Effect::Request(VerificationIntent::RequestDhs)],
    },
    TransitionRule {
        from: &[Unverified],
        guards: &[Guard::HasSsnOrNative],
        to: Target::To(SsaPending),
        effects: &[Effect::Request(VerificationIntent::RequestSsa)],
    },
];

const SSN_INVALID: &[TransitionRule] = &[TransitionRule {
    from: &[SsaPending],
    guards: &[],
    to: Target::To(VerificationOutstanding),
    effects: &[
        Effect::FailSsn,
        Effect::FailLawfulPresence(VerificationAuthority::Ssa),
    ],
}];

const SSN_VALID_CITIZENSHIP_PENDING: &[TransitionRule] = &[TransitionRule {
    from: &[SsaPending],
    guards: &[],
    to: Target::Stay,
    effects: &[Effect::PassSsn],
}];

const SSN_VALID_CITIZENSHIP_INVALID: &[TransitionRule] = &[
    TransitionRule {
        from: &[SsaPending],
        guards: &[Guard::Native],
        to: Target::To(VerificationOutstanding),
        effects: &[
            Effect::PassSsn,
            Effect::FailLawfulPresence(VerificationAuthority::Ssa),
        ],
    },
    TransitionRule {
        from: &[SsaPending],
        guards: &[Guard::NonNative],
        to: Target::To(DhsPending),
        effects: &[
            Effect::PassSsn,
            Effect::Request(VerificationIntent::RequestDhs),
        ],
    },
];

const SSA_PASS_EFFECTS: &[Effect] = &[
    Effect::PassSsn,
    Effect::PassLawfulPresence(Some(VerificationAuthority::Ssa)),
];

const SSN_VALID_CITIZENSHIP_VALID: &[TransitionRule] = &[
    TransitionRule {
        from: &[SsaPending],
        guards: &[Guard::ResidencyDenied],
        to: Target::To(VerificationOutstanding),
        effects: SSA_PASS_EFFECTS,
    },
    TransitionRule {
        from: &[SsaPending],
        guards: &[Guard::NoSciRejection, Guard::ResidencyPending],
        to: Target::To(SciVerified),
        effects: SSA_PASS_EFFECTS,
    },
    TransitionRule {
        from: &[SsaPending],
        guards: &[Guard::NoSciRejection, Guard::ResidencyVerified],
        to: Target::To(FullyVerified),
        effects: SSA_PASS_EFFECTS,
    },
    TransitionRule {
        from: &[SsaPending],
        guards: &[],
        to: Target::To(VerificationOutstanding),
        effects: SSA_PASS_EFFECTS,
    },
];

const SSN_AND_CITIZENSHIP_SOURCES: &[ConsumerVerificationState] =
    &[Unverified, SsaPending, VerificationOutstanding];

const SSN_AND_CITIZENSHIP_VALID: &[TransitionRule] = &[
    TransitionRule {
        from: SSN_AND_CITIZENSHIP_SOURCES,
        guards: &[Guard::ResidencyDenied],
        to: Target::To(VerificationOutstanding),
        effects: SSA_PASS_EFFECTS,
    },
    TransitionRule {
        from: SSN_AND_CITIZENSHIP_SOURCES,
        guards: &[Guard::NoSciRejection, Guard::ResidencyPending],
        to: Target::To(SciVerified),
        effects: SSA_PASS_EFFECTS,
    },
    TransitionRule {
        from: SSN_AND_CITIZENSHIP_SOURCES,
        guards: &[Guard::NoSciRejection, Guard::ResidencyVerified],
        to: Target::To(FullyVerified),
        effects: SSA_PASS_EFFECTS,
    },
    TransitionRule {
        from: SSN_AND_CITIZENSHIP_SOURCES,
        guards: &[],
        to: Target::To(VerificationOutstanding),
        effects: SSA_PASS_EFFECTS,
    },
];

const DHS_DENIED: &[TransitionRule] = &[TransitionRule {
    from: &[DhsPending],
    guards: &[],
    to: Target::To(VerificationOutstanding),
    effects: &[Effect::FailLawfulPresence(VerificationAuthority::Dhs)],
}];

const DHS_PASS_EFFECTS: &[Effect] = &[Effect::PassLawfulPresence(Some(VerificationAuthority::Dhs))];

const DHS_AUTHORIZED: &[TransitionRule] = &[
    TransitionRule {
        from: &[DhsPending],
        guards: &[Guard::NonNative, Guard::ResidencyDenied],
        to: Target::To(VerificationOutstanding),
        effects: DHS_PASS_EFFECTS,
    },
    TransitionRule {
        from: &[DhsPending],
        guards: &[
            Guard::NonNative,
            Guard::NoSciRejection,
            Guard::ResidencyPending,
        ],
        to: Target::To(SciVerified),
        effects: DHS_PASS_EFFECTS,
    },
    TransitionRule {
        from: &[DhsPending],
        guards: &[
            Guard::NonNative,
            Guard::NoSciRejection,
            Guard::ResidencyVerified,
        ],
        to: Target::To(FullyVerified),
        effects: DHS_PASS_EFFECTS,
    },
    TransitionRule {
        from: &[DhsPending],
        guards: &[Guard::NonNative],
        to: Target::To(VerificationOutstanding),
        effects: DHS_PASS_EFFECTS,
    },
];

const RESIDENCY_REDERIVED: &[ConsumerVerificationState] = &[
    SciVerified,
    FullyVerified,
    VerificationOutstanding,
    VerificationPeriodEnded,
];

const RESIDENCY_RESULT: &[TransitionRule] = &[
    TransitionRule {
        from: &[Unverified, SsaPending, DhsPending],
        guards: &[],
        to: Target::Stay,
        effects: &[],
    },
    TransitionRule {
        from: RESIDENCY_REDERIVED,
        guards: &[Guard::SciSatisfied, Guard::ResidencyVerified],
        to: Target::To(FullyVerified),
        effects: &[],
    },
    TransitionRule {
        from: RESIDENCY_REDERIVED,
        guards: &[Guard::SciSatisfied, Guard::ResidencyPending],
        to: Target::To(SciVerified),
        effects: &[],
    },
    TransitionRule {
        from: &[SciVerified, FullyVerified, VerificationOutstanding],
        guards: &[],
        to: Target::To(VerificationOutstanding),
        effects: &[],
    },
    TransitionRule {
        from: &[VerificationPeriodEnded],
        guards: &[],
        to: Target::Stay,
        effects: &[],
    },
];

const REJECT: &[TransitionRule] = &[TransitionRule {
    from: ANY_STATE,
    guards: &[],
    to: Target::To(VerificationOutstanding),
    effects: &[],
}];

const REVERT: &[TransitionRule] = &[TransitionRule {
    from: ANY_STATE,
    guards: &[],
    to: Target::To(Unverified),
    effects: &[Effect::ResetToDefaults],
}];

const ADMIN_VERIFY: &[TransitionRule] = &[
    TransitionRule {
        from: &[
            Unverified,
            SsaPending,
            DhsPending,
            VerificationOutstanding,
            SciVerified,
            VerificationPeriodEnded,
        ],
        guards: &[Guard::AllTracksVerified],
        to: Target::To(FullyVerified),
        effects: &[],
    },
    TransitionRule {
        from: ANY_STATE,
        guards: &[],
        to: Target::Stay,
        effects: &[],
    },
];

const VERIFICATION_PERIOD_EXPIRED: &[TransitionRule] = &[TransitionRule {
    from: &[VerificationOutstanding],
    guards: &[Guard::VerificationPeriodElapsed],
    to: Target::To(VerificationPeriodEnded),
    effects: &[],
}];

const IMPORT: &[TransitionRule] = &[TransitionRule {
    from: &[Unverified],
    guards: &[],
    to: Target::To(FullyVerified),
    effects: &[
        Effect::PassSsn,
        Effect::PassLawfulPresence(None),
        Effect::PassNative,
        Effect::PassResidency,
    ],
}];

/// Table-driven machine aggregating the verification ledger into a lifecycle state.
///
/// Each event first applies its payload to a scratch copy of the aggregate, then walks the
/// event's rule table in order. The first rule whose source state and guards match wins.
/// SSN/citizenship guards always precede residency guards within a rule.
#[derive(Debug, Clone)]
pub struct ConsumerVerificationStateMachine {
    verification_period_days: u32,
}

impl Default for ConsumerVerificationStateMachine {
    fn default() -> Self {
        Self::new(&WorkflowConfig::default())
    }
}

impl ConsumerVerificationStateMachine {
    pub fn new(config: &WorkflowConfig) -> Self {
        Self {
            verification_period_days: config.verification_period_days,
        }
    }

    pub fn verification_period_days(&self) -> u32 {
        self.verification_period_days
    }

    pub fn apply(
        &self,
        current: &ConsumerVerification,
        event: &VerificationEvent,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        let now = clock.now();
        let from = current.state;
        let reason = event.reason();

        let mut scratch = current.clone();
        let rules = apply_payload(event, &mut scratch, now);

        let ctx = GuardContext {
            verification: &scratch,
            today: now.date_naive(),
            period_days: self.verification_period_days,
        };
        let rule = rules
            .iter()
            .find(|rule| rule.from.contains(&from) && rule.guards.iter().all(|g| g.holds(&ctx)))
            .ok_or(VerificationError::InvalidTransition {
                from,
                event: event.name(),
            })?;

        let mut intents = Vec::new();
        for effect in rule.effects {
            apply_effect(*effect, &mut scratch, &mut intents, reason, now);
        }
        if matches!(
            event,
            VerificationEvent::CoveragePurchased {
                residency_known: false
            }
        ) {
            intents.push(VerificationIntent::RequestResidency);
        }

        let to = match rule.to {
            Target::To(state) => state,
            Target::Stay => from,
        };
        scratch.state = to;
        // Leaving an ended period for outstanding opens a fresh one.
        scratch.outstanding_since = match to {
            VerificationOutstanding if from == VerificationPeriodEnded => Some(now.date_naive()),
            VerificationOutstanding => scratch.outstanding_since.or(Some(now.date_naive())),
            VerificationPeriodEnded => scratch.outstanding_since,
            _ => None,
        };

        check_ledger(&scratch.identity, &scratch.ledger)?;

        let changed = scratch != *current;
        Ok(VerificationTransition {
            from,
            to,
            event: event.name(),
            verification: scratch,
            intents,
            changed,
        })
    }

    pub fn coverage_purchased(
        &self,
        current: &ConsumerVerification,
        residency_known: bool,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(
            current,
            &VerificationEvent::CoveragePurchased { residency_known },
            clock,
        )
    }

    pub fn ssn_response(
        &self,
        current: &ConsumerVerification,
        valid: bool,
        citizenship: Option<bool>,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(
            current,
            &VerificationEvent::SsnResponse { valid, citizenship },
            clock,
        )
    }

    pub fn ssn_and_citizenship_valid(
        &self,
        current: &ConsumerVerification,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(current, &VerificationEvent::SsnAndCitizenshipValid, clock)
    }

    pub fn dhs_response(
        &self,
        current: &ConsumerVerification,
        authorized: bool,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(
            current,
            &VerificationEvent::DhsResponse {
                authorized,
                document_ref: None,
            },
            clock,
        )
    }

    pub fn residency_result(
        &self,
        current: &ConsumerVerification,
        outcome: ResidencyOutcome,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(current, &VerificationEvent::ResidencyResult { outcome }, clock)
    }

    pub fn reject(
        &self,
        current: &ConsumerVerification,
        track: VerificationTrack,
        reason: &str,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(
            current,
            &VerificationEvent::Reject {
                track,
                reason: reason.to_string(),
            },
            clock,
        )
    }

    pub fn revert(
        &self,
        current: &ConsumerVerification,
        reason: &str,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(
            current,
            &VerificationEvent::Revert {
                reason: reason.to_string(),
            },
            clock,
        )
    }

    pub fn admin_verify(
        &self,
        current: &ConsumerVerification,
        track: VerificationTrack,
        reason: &str,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(
            current,
            &VerificationEvent::AdminVerify {
                track,
                reason: reason.to_string(),
            },
            clock,
        )
    }

    pub fn expire_verification_period(
        &self,
        current: &ConsumerVerification,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(current, &VerificationEvent::VerificationPeriodExpired, clock)
    }

    pub fn import(
        &self,
        current: &ConsumerVerification,
        clock: &dyn ClockSource,
    ) -> Result<VerificationTransition, VerificationError> {
        self.apply(current, &VerificationEvent::Import, clock)
    }
}

/// Write the event payload onto the scratch aggregate and pick the rule table to walk.
fn apply_payload(
    event: &VerificationEvent,
    scratch: &mut ConsumerVerification,
    now: DateTime<Utc>,
) -> &'static [TransitionRule] {
    match event {
        VerificationEvent::CoveragePurchased { .. } => COVERAGE_PURCHASED,
        VerificationEvent::SsnResponse { valid: false, .. } => SSN_INVALID,
        VerificationEvent::SsnResponse {
            valid: true,
            citizenship: None,
        } => SSN_VALID_CITIZENSHIP_PENDING,
        VerificationEvent::SsnResponse {
            valid: true,
            citizenship: Some(false),
        } => SSN_VALID_CITIZENSHIP_INVALID,
        VerificationEvent::SsnResponse {
            valid: true,
            citizenship: Some(true),
        } => SSN_VALID_CITIZENSHIP_VALID,
        VerificationEvent::SsnAndCitizenshipValid => SSN_AND_CITIZENSHIP_VALID,
        VerificationEvent::DhsResponse {
            authorized,
            document_ref,
        } => {
            if document_ref.is_some() {
                scratch.ledger.set_vlp_document_ref(document_ref.clone());
            }
            if *authorized {
                DHS_AUTHORIZED
            } else {
                DHS_DENIED
            }
        }
        VerificationEvent::ResidencyResult { outcome } => {
            scratch
                .ledger
                .set_residency_status(outcome.status(), event.name(), now);
            RESIDENCY_RESULT
        }
        VerificationEvent::Reject { track, reason } => {
            reject_track(scratch, *track, reason, now);
            REJECT
        }
        VerificationEvent::Revert { .. } => REVERT,
        VerificationEvent::AdminVerify { track, reason } => {
            verify_track(scratch, *track, reason, now);
            ADMIN_VERIFY
        }
        VerificationEvent::VerificationPeriodExpired => VERIFICATION_PERIOD_EXPIRED,
        VerificationEvent::Import => IMPORT,
    }
}

fn reject_track(
    scratch: &mut ConsumerVerification,
    track: VerificationTrack,
    reason: &str,
    now: DateTime<Utc>,
) {
    let ledger = &mut scratch.ledger;
    match track {
        VerificationTrack::Ssn => ledger.set_ssn_status(TrackStatus::Outstanding, reason),
        VerificationTrack::LawfulPresence => {
            let authority = ledger.lawful_presence().vlp_authority;
            ledger.set_lawful_presence(LawfulPresenceResult::Outstanding, authority, reason, now)
        }
        VerificationTrack::AmericanIndianStatus => {
            ledger.set_native_status(TrackStatus::Outstanding, reason)
        }
        VerificationTrack::Residency => {
            ledger.set_residency_status(ResidencyStatus::Outstanding, reason, now)
        }
    }
    ledger.set_rejected(track, true);
}

fn verify_track(
    scratch: &mut ConsumerVerification,
    track: VerificationTrack,
    reason: &str,
    now: DateTime<Utc>,
) {
    match track {
        VerificationTrack::Ssn => pass_ssn(scratch, reason),
        VerificationTrack::LawfulPresence => {
            let authority = scratch.ledger.lawful_presence().vlp_authority;
            scratch.ledger.set_lawful_presence(
                LawfulPresenceResult::Verified,
                authority,
                reason,
                now,
            )
        }
        VerificationTrack::AmericanIndianStatus => pass_native(scratch, reason),
        VerificationTrack::Residency => {
            scratch
                .ledger
                .set_residency_status(ResidencyStatus::Valid, reason, now)
        }
    }
    scratch.ledger.set_rejected(track, false);
}

fn pass_ssn(scratch: &mut ConsumerVerification, reason: &str) {
    let status = if scratch.identity.has_ssn() {
        TrackStatus::Valid
    } else {
        TrackStatus::Na
    };
    scratch.ledger.set_ssn_status(status, reason);
}

fn pass_native(scratch: &mut ConsumerVerification, reason: &str) {
    let status = if scratch.identity.has_tribal_id() {
        TrackStatus::Valid
    } else {
        TrackStatus::Na
    };
    scratch.ledger.set_native_status(status, reason);
}

fn apply_effect(
    effect: Effect,
    scratch: &mut ConsumerVerification,
    intents: &mut Vec<VerificationIntent>,
    reason: &str,
    now: DateTime<Utc>,
) {
    match effect {
        Effect::FlagSsnForNative => scratch
            .ledger
            .set_ssn_status(TrackStatus::Outstanding, NO_SSN_FOR_NATIVE),
        Effect::PassSsn => pass_ssn(scratch, reason),
        Effect::FailSsn => scratch.ledger.set_ssn_status(TrackStatus::Outstanding, reason),
        Effect::PassLawfulPresence(authority) => scratch.ledger.set_lawful_presence(
            LawfulPresenceResult::Verified,
            authority,
            reason,
            now,
        ),
        Effect::FailLawfulPresence(authority) => scratch.ledger.set_lawful_presence(
            LawfulPresenceResult::Outstanding,
            Some(authority),
            reason,
            now,
        ),
        Effect::PassNative => pass_native(scratch, reason),
        Effect::PassResidency => {
            scratch
                .ledger
                .set_residency_status(ResidencyStatus::Valid, reason, now)
        }
        Effect::ResetToDefaults => {
            let identity = scratch.identity.clone();
            scratch.ledger.reset_to_defaults(&identity, reason)
        }
        Effect::Request(intent) => intents.push(intent),
    }
}
