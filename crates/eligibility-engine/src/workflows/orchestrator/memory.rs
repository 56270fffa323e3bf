use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::repository::{
    CommitBatch, ConsumerRecord, EnrollmentRecord, RepositoryError, VersionedWrite,
    WorkflowRepository,
};
use crate::workflows::audit::{AuditEntry, AuditTrail, EntityKind};
use crate::workflows::enrollment::EnrollmentId;
use crate::workflows::verification::{ConsumerId, ConsumerVerificationState};

#[derive(Debug, Default)]
struct Store {
    consumers: HashMap<ConsumerId, ConsumerRecord>,
    enrollments: HashMap<EnrollmentId, EnrollmentRecord>,
    audit: AuditTrail,
}

/// Process-local repository. A single mutex covers records and the audit trail, so a
/// commit is observed entirely or not at all.
#[derive(Debug, Default)]
pub struct MemoryWorkflowRepository {
    store: Mutex<Store>,
}

impl MemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_version(
    entity: &str,
    write_expected: Option<u64>,
    stored_version: Option<u64>,
) -> Result<(), RepositoryError> {
    match (write_expected, stored_version) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(RepositoryError::Conflict),
        (Some(_), None) => Err(RepositoryError::NotFound),
        (Some(expected), Some(actual)) if expected == actual => Ok(()),
        (Some(expected), Some(actual)) => Err(RepositoryError::VersionMismatch {
            entity: entity.to_string(),
            expected,
            actual,
        }),
    }
}

impl WorkflowRepository for MemoryWorkflowRepository {
    fn fetch_consumer(&self, id: &ConsumerId) -> Result<Option<ConsumerRecord>, RepositoryError> {
        Ok(self.store().consumers.get(id).cloned())
    }

    fn fetch_enrollment(
        &self,
        id: &EnrollmentId,
    ) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        Ok(self.store().enrollments.get(id).cloned())
    }

    fn enrollments_for(
        &self,
        consumer_id: &ConsumerId,
    ) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        let store = self.store();
        let mut records: Vec<_> = store
            .enrollments
            .values()
            .filter(|record| record.enrollment.consumer_id() == consumer_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.enrollment.id().cmp(b.enrollment.id()));
        Ok(records)
    }

    fn outstanding(&self, limit: usize) -> Result<Vec<ConsumerRecord>, RepositoryError> {
        let store = self.store();
        let mut records: Vec<_> = store
            .consumers
            .values()
            .filter(|record| {
                record.verification.state() == ConsumerVerificationState::VerificationOutstanding
            })
            .cloned()
            .collect();
        records.sort_by_key(|record| {
            (
                record.verification.outstanding_since(),
                record.consumer_id.clone(),
            )
        });
        records.truncate(limit);
        Ok(records)
    }

    fn commit(&self, batch: CommitBatch) -> Result<Vec<AuditEntry>, RepositoryError> {
        let mut store = self.store();

        if let Some(write) = &batch.consumer {
            let id = &write.record.consumer_id;
            let stored = store.consumers.get(id).map(|record| record.version);
            check_version(&id.0, write.expected_version, stored)?;
        }
        for write in &batch.enrollments {
            let id = write.record.enrollment.id();
            let stored = store.enrollments.get(id).map(|record| record.version);
            check_version(&id.0, write.expected_version, stored)?;
        }

        let entries = store.audit.append_batch(batch.audit)?;

        if let Some(VersionedWrite { record, .. }) = batch.consumer {
            store.consumers.insert(record.consumer_id.clone(), record);
        }
        for VersionedWrite { record, .. } in batch.enrollments {
            store
                .enrollments
                .insert(record.enrollment.id().clone(), record);
        }

        Ok(entries)
    }

    fn audit_entries(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        Ok(self.store().audit.entries_for(kind, entity_id))
    }

    fn was_ever_in(
        &self,
        kind: EntityKind,
        entity_id: &str,
        state: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self.store().audit.was_ever_in(kind, entity_id, state))
    }
}
