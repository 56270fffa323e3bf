use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::verification::ConsumerId;

/// Identifier wrapper for enrollments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Market the coverage was purchased in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentKind {
    Individual,
    EmployerSponsored,
    EmployerSponsoredCobra,
    Coverall,
}

impl EnrollmentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::EmployerSponsored => "employer_sponsored",
            Self::EmployerSponsoredCobra => "employer_sponsored_cobra",
            Self::Coverall => "coverall",
        }
    }
}

/// Coverage lifecycle state of one enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    #[default]
    Shopping,
    CoverageSelected,
    Transmitted,
    CoverageEnrolled,
    CoverageTerminationPending,
    Terminated,
    Canceled,
    Void,
    Inactive,
    Unverified,
    AutoRenewing,
    RenewingWaived,
    RenewingCoverageSelected,
    RenewingTransmitted,
    RenewingCoverageEnrolled,
}

impl EnrollmentState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Shopping => "shopping",
            Self::CoverageSelected => "coverage_selected",
            Self::Transmitted => "transmitted",
            Self::CoverageEnrolled => "coverage_enrolled",
            Self::CoverageTerminationPending => "coverage_termination_pending",
            Self::Terminated => "terminated",
            Self::Canceled => "canceled",
            Self::Void => "void",
            Self::Inactive => "inactive",
            Self::Unverified => "unverified",
            Self::AutoRenewing => "auto_renewing",
            Self::RenewingWaived => "renewing_waived",
            Self::RenewingCoverageSelected => "renewing_coverage_selected",
            Self::RenewingTransmitted => "renewing_transmitted",
            Self::RenewingCoverageEnrolled => "renewing_coverage_enrolled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Canceled | Self::Void)
    }

    pub const fn is_renewal(self) -> bool {
        matches!(
            self,
            Self::AutoRenewing
                | Self::RenewingWaived
                | Self::RenewingCoverageSelected
                | Self::RenewingTransmitted
                | Self::RenewingCoverageEnrolled
        )
    }

    /// States in which the consumer holds, or is about to hold, coverage.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::CoverageSelected
                | Self::Transmitted
                | Self::CoverageEnrolled
                | Self::CoverageTerminationPending
                | Self::Unverified
                | Self::AutoRenewing
                | Self::RenewingCoverageSelected
                | Self::RenewingTransmitted
                | Self::RenewingCoverageEnrolled
        )
    }
}

impl fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reason an employer-sponsored enrollment window exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentWindowKind {
    NewHire,
    OpenEnrollment,
    SpecialEnrollment,
}

/// Period during which an employee may select coverage, and the coverage dates it allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentWindow {
    pub kind: EnrollmentWindowKind,
    pub opens_on: NaiveDate,
    pub closes_on: NaiveDate,
    pub effective_from: NaiveDate,
    pub effective_until: NaiveDate,
}

impl EnrollmentWindow {
    pub fn is_open_on(&self, today: NaiveDate) -> bool {
        self.opens_on <= today && today <= self.closes_on
    }

    pub fn covers(&self, effective_on: NaiveDate) -> bool {
        self.effective_from <= effective_on && effective_on <= self.effective_until
    }
}

/// One coverage-selection attempt and its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrollment {
    id: EnrollmentId,
    consumer_id: ConsumerId,
    kind: EnrollmentKind,
    state: EnrollmentState,
    is_outstanding: bool,
    effective_on: NaiveDate,
    terminated_on: Option<NaiveDate>,
    termination_submitted_on: Option<NaiveDate>,
    enrollment_windows: Vec<EnrollmentWindow>,
    predecessor_id: Option<EnrollmentId>,
}

impl Enrollment {
    pub fn new(
        id: EnrollmentId,
        consumer_id: ConsumerId,
        kind: EnrollmentKind,
        effective_on: NaiveDate,
    ) -> Self {
        Self {
            id,
            consumer_id,
            kind,
            state: EnrollmentState::Shopping,
            is_outstanding: false,
            effective_on,
            terminated_on: None,
            termination_submitted_on: None,
            enrollment_windows: Vec::new(),
            predecessor_id: None,
        }
    }

    pub fn with_windows(mut self, windows: Vec<EnrollmentWindow>) -> Self {
        self.enrollment_windows = windows;
        self
    }

    /// Start a new enrollment continuing a terminated or canceled one. The predecessor is
    /// never touched; the link is the only relationship between the two records.
    pub fn reinstatement_of(
        predecessor: &Enrollment,
        id: EnrollmentId,
    ) -> Result<Self, ReinstatementError> {
        if !matches!(
            predecessor.state,
            EnrollmentState::Terminated | EnrollmentState::Canceled
        ) {
            return Err(ReinstatementError {
                enrollment_id: predecessor.id.clone(),
                state: predecessor.state,
            });
        }

        Ok(Self {
            id,
            consumer_id: predecessor.consumer_id.clone(),
            kind: predecessor.kind,
            state: EnrollmentState::CoverageSelected,
            is_outstanding: false,
            effective_on: predecessor.effective_on,
            terminated_on: None,
            termination_submitted_on: None,
            enrollment_windows: predecessor.enrollment_windows.clone(),
            predecessor_id: Some(predecessor.id.clone()),
        })
    }

    pub fn id(&self) -> &EnrollmentId {
        &self.id
    }

    pub fn consumer_id(&self) -> &ConsumerId {
        &self.consumer_id
    }

    pub fn kind(&self) -> EnrollmentKind {
        self.kind
    }

    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    pub fn is_outstanding(&self) -> bool {
        self.is_outstanding
    }

    pub fn effective_on(&self) -> NaiveDate {
        self.effective_on
    }

    pub fn terminated_on(&self) -> Option<NaiveDate> {
        self.terminated_on
    }

    pub fn termination_submitted_on(&self) -> Option<NaiveDate> {
        self.termination_submitted_on
    }

    pub fn enrollment_windows(&self) -> &[EnrollmentWindow] {
        &self.enrollment_windows
    }

    pub fn predecessor_id(&self) -> Option<&EnrollmentId> {
        self.predecessor_id.as_ref()
    }

    /// Employer-sponsored coverage needs an open window whose effective range contains the
    /// coverage start date. Other kinds are gated by verification instead.
    pub fn can_select_coverage(&self, today: NaiveDate) -> bool {
        match self.kind {
            EnrollmentKind::Individual
            | EnrollmentKind::Coverall
            | EnrollmentKind::EmployerSponsoredCobra => true,
            EnrollmentKind::EmployerSponsored => self
                .enrollment_windows
                .iter()
                .any(|window| window.is_open_on(today) && window.covers(self.effective_on)),
        }
    }

    pub fn termination_attributes_cleared(&self) -> bool {
        self.terminated_on.is_none() && self.termination_submitted_on.is_none()
    }

    pub(crate) fn set_outstanding(&mut self, outstanding: bool) {
        self.is_outstanding = outstanding;
    }

    pub(crate) fn set_state(&mut self, state: EnrollmentState) {
        self.state = state;
    }

    pub(crate) fn record_termination(&mut self, on: NaiveDate, submitted_on: NaiveDate) {
        self.terminated_on = Some(on);
        self.termination_submitted_on = Some(submitted_on);
    }

    pub(crate) fn clear_termination(&mut self) {
        self.terminated_on = None;
        self.termination_submitted_on = None;
    }
}

/// Raised when reinstating an enrollment that is still live.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("enrollment {enrollment_id} cannot be reinstated from state '{state}'")]
pub struct ReinstatementError {
    pub enrollment_id: EnrollmentId,
    pub state: EnrollmentState,
}
