use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::workflows::audit::{AuditEntry, AuditError, AuditRecord, EntityKind};
use crate::workflows::enrollment::{Enrollment, EnrollmentId, EnrollmentKind};
use crate::workflows::verification::{
    ConsumerId, ConsumerVerification, VerificationAuthority, VerificationLedger,
    VerificationTrack,
};

/// Request sent to an external authority that has not been answered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub authority: VerificationAuthority,
    pub requested_at: DateTime<Utc>,
}

/// Stored consumer aggregate plus its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerRecord {
    pub consumer_id: ConsumerId,
    pub verification: ConsumerVerification,
    pub version: u64,
    pub pending_requests: Vec<PendingRequest>,
}

/// Stored enrollment plus its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentRecord {
    pub enrollment: Enrollment,
    pub version: u64,
}

/// A record write guarded by the version the writer read. `None` inserts a new record.
#[derive(Debug, Clone)]
pub struct VersionedWrite<T> {
    pub expected_version: Option<u64>,
    pub record: T,
}

/// Everything one orchestrator call persists. Applied entirely or not at all.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    pub consumer: Option<VersionedWrite<ConsumerRecord>>,
    pub enrollments: Vec<VersionedWrite<EnrollmentRecord>>,
    pub audit: Vec<AuditRecord>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.consumer.is_none() && self.enrollments.is_empty() && self.audit.is_empty()
    }
}

/// Storage abstraction so the orchestrator can be exercised in isolation.
pub trait WorkflowRepository: Send + Sync {
    fn fetch_consumer(&self, id: &ConsumerId) -> Result<Option<ConsumerRecord>, RepositoryError>;
    fn fetch_enrollment(
        &self,
        id: &EnrollmentId,
    ) -> Result<Option<EnrollmentRecord>, RepositoryError>;
    fn enrollments_for(
        &self,
        consumer_id: &ConsumerId,
    ) -> Result<Vec<EnrollmentRecord>, RepositoryError>;
    /// Consumers currently in `verification_outstanding`, oldest first.
    fn outstanding(&self, limit: usize) -> Result<Vec<ConsumerRecord>, RepositoryError>;
    fn commit(&self, batch: CommitBatch) -> Result<Vec<AuditEntry>, RepositoryError>;
    fn audit_entries(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, RepositoryError>;
    fn was_ever_in(
        &self,
        kind: EntityKind,
        entity_id: &str,
        state: &str,
    ) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("{entity} version mismatch: expected {expected}, found {actual}")]
    VersionMismatch {
        entity: String,
        expected: u64,
        actual: u64,
    },
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outstanding authority request as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwaitingUpstream {
    pub authority: VerificationAuthority,
    pub requested_at: DateTime<Utc>,
    pub overdue: bool,
}

/// Read model for a consumer's verification status.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerStatusView {
    pub consumer_id: ConsumerId,
    pub state: &'static str,
    pub version: u64,
    pub ledger: VerificationLedger,
    pub unresolved_tracks: Vec<VerificationTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_due_on: Option<NaiveDate>,
    pub awaiting_upstream: Vec<AwaitingUpstream>,
}

/// Read model for an enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentStatusView {
    pub enrollment_id: EnrollmentId,
    pub consumer_id: ConsumerId,
    pub kind: EnrollmentKind,
    pub state: &'static str,
    pub is_outstanding: bool,
    pub effective_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminated_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predecessor_id: Option<EnrollmentId>,
    /// Auto-renewing enrollment the consumer has since actively re-selected.
    pub active_renewal: bool,
    pub version: u64,
}
