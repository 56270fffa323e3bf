use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::repository::{ConsumerRecord, EnrollmentRecord};
use crate::workflows::audit::AuditEntry;
use crate::workflows::enrollment::{
    EnrollmentEvent, EnrollmentId, EnrollmentKind, EnrollmentWindow,
};
use crate::workflows::verification::{
    ConsumerId, Identity, ResidencyOutcome, ResidencyStatus, SensitiveField,
    VerificationAuthority, VerificationEvent, VerificationTrack,
};

/// Application data needed to create a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRegistration {
    pub identity: Identity,
    #[serde(default)]
    pub residency: ResidencyStatus,
}

/// Opens a new enrollment in `shopping` for an existing consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub consumer_id: ConsumerId,
    pub kind: EnrollmentKind,
    pub effective_on: NaiveDate,
    #[serde(default)]
    pub enrollment_windows: Vec<EnrollmentWindow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveragePurchased {
    pub consumer_id: ConsumerId,
    pub residency_known: bool,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Payload returned by an external verification authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationResponse {
    Ssa {
        ssn_valid: bool,
        #[serde(default)]
        citizenship_valid: Option<bool>,
    },
    /// Combined SSA answer confirming both SSN and citizenship.
    SsnAndCitizenshipValid,
    Dhs {
        authorized: bool,
        #[serde(default)]
        document_ref: Option<String>,
    },
    Residency {
        outcome: ResidencyOutcome,
    },
}

impl VerificationResponse {
    pub const fn authority(&self) -> VerificationAuthority {
        match self {
            Self::Ssa { .. } | Self::SsnAndCitizenshipValid => VerificationAuthority::Ssa,
            Self::Dhs { .. } => VerificationAuthority::Dhs,
            Self::Residency { .. } => VerificationAuthority::LocalResidency,
        }
    }

    pub fn into_event(self) -> VerificationEvent {
        match self {
            Self::Ssa {
                ssn_valid,
                citizenship_valid,
            } => VerificationEvent::SsnResponse {
                valid: ssn_valid,
                citizenship: citizenship_valid,
            },
            Self::SsnAndCitizenshipValid => VerificationEvent::SsnAndCitizenshipValid,
            Self::Dhs {
                authorized,
                document_ref,
            } => VerificationEvent::DhsResponse {
                authorized,
                document_ref,
            },
            Self::Residency { outcome } => VerificationEvent::ResidencyResult { outcome },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponseReceived {
    pub consumer_id: ConsumerId,
    pub response: VerificationResponse,
    /// Identifier of the responding service, recorded as the audit actor.
    pub authority: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    Verify,
    Reject,
    Revert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminVerificationOverride {
    pub consumer_id: ConsumerId,
    pub track: VerificationTrack,
    pub action: OverrideAction,
    pub reason: String,
    pub actor_id: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

impl AdminVerificationOverride {
    pub fn to_event(&self) -> VerificationEvent {
        let reason = self.reason.clone();
        match self.action {
            OverrideAction::Verify => VerificationEvent::AdminVerify {
                track: self.track,
                reason,
            },
            OverrideAction::Reject => VerificationEvent::Reject {
                track: self.track,
                reason,
            },
            OverrideAction::Revert => VerificationEvent::Revert { reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveFieldChanged {
    pub consumer_id: ConsumerId,
    pub field: SensitiveField,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentActionKind {
    Select,
    Waive,
    Terminate,
    Cancel,
    ScheduleTermination,
    Transmit,
    Effectuate,
    Renew,
    RenewWaived,
    BeginCoverage,
    RevertTermination,
    Invalidate,
    Reinstate,
}

impl EnrollmentActionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Waive => "waive",
            Self::Terminate => "terminate",
            Self::Cancel => "cancel",
            Self::ScheduleTermination => "schedule_termination",
            Self::Transmit => "transmit",
            Self::Effectuate => "effectuate",
            Self::Renew => "renew",
            Self::RenewWaived => "renew_waived",
            Self::BeginCoverage => "begin_coverage",
            Self::RevertTermination => "revert_termination",
            Self::Invalidate => "invalidate",
            Self::Reinstate => "reinstate",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentActionParams {
    /// Termination date for `terminate` and `schedule_termination`.
    #[serde(default)]
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentAction {
    pub enrollment_id: EnrollmentId,
    pub action: EnrollmentActionKind,
    #[serde(default)]
    pub params: EnrollmentActionParams,
    pub actor_id: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

impl EnrollmentAction {
    /// Machine event for the action. `Ok(None)` marks a reinstatement, which creates a new
    /// enrollment instead of transitioning this one.
    pub fn to_event(&self) -> Result<Option<EnrollmentEvent>, &'static str> {
        let event = match self.action {
            EnrollmentActionKind::Select => EnrollmentEvent::SelectCoverage,
            EnrollmentActionKind::Waive => EnrollmentEvent::Waive,
            EnrollmentActionKind::Terminate => EnrollmentEvent::Terminate {
                on: self.params.on,
            },
            EnrollmentActionKind::Cancel => EnrollmentEvent::Cancel,
            EnrollmentActionKind::ScheduleTermination => EnrollmentEvent::ScheduleTermination {
                on: self.params.on.ok_or("on")?,
            },
            EnrollmentActionKind::Transmit => EnrollmentEvent::Transmit,
            EnrollmentActionKind::Effectuate => EnrollmentEvent::Effectuate,
            EnrollmentActionKind::Renew => EnrollmentEvent::RenewEnrollment,
            EnrollmentActionKind::RenewWaived => EnrollmentEvent::RenewWaived,
            EnrollmentActionKind::BeginCoverage => EnrollmentEvent::BeginCoverage,
            EnrollmentActionKind::RevertTermination => EnrollmentEvent::RevertTermination,
            EnrollmentActionKind::Invalidate => EnrollmentEvent::Invalidate,
            EnrollmentActionKind::Reinstate => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Outbound notification published after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrationEvent {
    EligibilityChanged {
        consumer_id: ConsumerId,
        enrollment_ids_affected: Vec<EnrollmentId>,
    },
    EnrollmentStateChanged {
        enrollment_id: EnrollmentId,
        from: Option<String>,
        to: String,
        event: String,
    },
    VerificationStateChanged {
        consumer_id: ConsumerId,
        from: String,
        to: String,
    },
    VerificationRequested {
        consumer_id: ConsumerId,
        authority: VerificationAuthority,
    },
}

impl IntegrationEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::EligibilityChanged { .. } => "eligibility_changed",
            Self::EnrollmentStateChanged { .. } => "enrollment_state_changed",
            Self::VerificationStateChanged { .. } => "verification_state_changed",
            Self::VerificationRequested { .. } => "verification_requested",
        }
    }
}

/// Result of one orchestrator call: the committed records, the audit entries written and
/// the events awaiting dispatch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ConsumerRecord>,
    pub enrollments: Vec<EnrollmentRecord>,
    pub audit: Vec<AuditEntry>,
    pub events: Vec<IntegrationEvent>,
}

impl WorkflowOutcome {
    /// True when the call was a replay that committed nothing.
    pub fn is_noop(&self) -> bool {
        self.audit.is_empty() && self.events.is_empty()
    }
}
