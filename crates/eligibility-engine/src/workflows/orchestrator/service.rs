use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info};

use super::events::{
    AdminVerificationOverride, ConsumerRegistration, CoveragePurchased, EnrollmentAction,
    EnrollmentRequest, IntegrationEvent, SensitiveFieldChanged, VerificationResponseReceived,
    WorkflowOutcome,
};
use super::locks::EntityLocks;
use super::repository::{
    AwaitingUpstream, CommitBatch, ConsumerRecord, ConsumerStatusView, EnrollmentRecord,
    EnrollmentStatusView, PendingRequest, RepositoryError, VersionedWrite, WorkflowRepository,
};
use crate::clock::ClockSource;
use crate::config::WorkflowConfig;
use crate::workflows::audit::{AuditEntry, AuditRecord, EntityKind};
use crate::workflows::eligibility::{EligibilityConfig, EligibilityEvaluator};
use crate::workflows::enrollment::{
    Enrollment, EnrollmentError, EnrollmentId, EnrollmentState, EnrollmentStateMachine,
    EnrollmentTransition,
};
use crate::workflows::verification::{
    ConsumerId, ConsumerVerification, ConsumerVerificationStateMachine, IdentityError,
    VerificationAuthority, VerificationError, VerificationEvent,
};

const SYSTEM_ACTOR: &str = "system";
const SENSITIVE_FIELD_CHANGED: &str = "sensitive_field_changed";

static CONSUMER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ENROLLMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_consumer_id() -> ConsumerId {
    let id = CONSUMER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ConsumerId(format!("consumer-{id:06}"))
}

fn next_enrollment_id() -> EnrollmentId {
    let id = ENROLLMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EnrollmentId(format!("enrollment-{id:06}"))
}

/// Coordinates both state machines, the evaluator and the audit trail for one consumer at
/// a time. Every mutating call runs under the consumer's lock and commits one batch.
pub struct WorkflowOrchestrator<R> {
    repository: Arc<R>,
    clock: Arc<dyn ClockSource>,
    locks: EntityLocks,
    verification: ConsumerVerificationStateMachine,
    enrollment: EnrollmentStateMachine,
    evaluator: EligibilityEvaluator,
    config: WorkflowConfig,
}

/// Which enrollments are re-evaluated after the consumer has been updated.
enum Scope {
    All,
    Only(EnrollmentId),
}

struct TrackedEnrollment {
    record: EnrollmentRecord,
    /// `None` for enrollments created during this call.
    stored_version: Option<u64>,
    touched: bool,
}

/// Working copy of a consumer and its enrollments for the duration of one call.
struct Pass {
    consumer: ConsumerRecord,
    consumer_changed: bool,
    enrollments: Vec<TrackedEnrollment>,
    audit: Vec<AuditRecord>,
    events: Vec<IntegrationEvent>,
    flipped: Vec<EnrollmentId>,
}

impl Pass {
    fn position(&self, id: &EnrollmentId) -> Option<usize> {
        self.enrollments
            .iter()
            .position(|tracked| tracked.record.enrollment.id() == id)
    }
}

impl<R> WorkflowOrchestrator<R>
where
    R: WorkflowRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        clock: Arc<dyn ClockSource>,
        config: WorkflowConfig,
        eligibility: EligibilityConfig,
    ) -> Self {
        Self {
            repository,
            clock,
            locks: EntityLocks::new(),
            verification: ConsumerVerificationStateMachine::new(&config),
            enrollment: EnrollmentStateMachine::new(),
            evaluator: EligibilityEvaluator::new(eligibility),
            config,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Create a consumer in `unverified` from application data.
    pub fn register_consumer(
        &self,
        registration: ConsumerRegistration,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let consumer_id = next_consumer_id();
        let verification =
            ConsumerVerification::register(registration.identity, registration.residency);
        let record = ConsumerRecord {
            consumer_id: consumer_id.clone(),
            verification,
            version: 1,
            pending_requests: Vec::new(),
        };

        let audit = vec![AuditRecord {
            entity_kind: EntityKind::Consumer,
            entity_id: consumer_id.0.clone(),
            from_state: None,
            to_state: record.verification.state().label().to_string(),
            triggering_event: "register_consumer".to_string(),
            actor_id: SYSTEM_ACTOR.to_string(),
            occurred_at: self.clock.now(),
        }];

        let entries = self
            .repository
            .commit(CommitBatch {
                consumer: Some(VersionedWrite {
                    expected_version: None,
                    record: record.clone(),
                }),
                enrollments: Vec::new(),
                audit,
            })
            .map_err(WorkflowError::from_repository)?;

        info!(consumer_id = %consumer_id, "consumer registered");
        Ok(WorkflowOutcome {
            consumer: Some(record),
            enrollments: Vec::new(),
            audit: entries,
            events: Vec::new(),
        })
    }

    /// Open a `shopping` enrollment. Its outstanding flag is initialised from the
    /// consumer's current verification without counting as a flip.
    pub fn open_enrollment(
        &self,
        request: EnrollmentRequest,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let key = request.consumer_id.0.clone();
        self.locks.with_lock(&key, || self.open_locked(request))
    }

    fn open_locked(&self, request: EnrollmentRequest) -> Result<WorkflowOutcome, WorkflowError> {
        let consumer = self
            .repository
            .fetch_consumer(&request.consumer_id)?
            .ok_or_else(|| WorkflowError::ConsumerNotFound(request.consumer_id.clone()))?;

        let mut enrollment = Enrollment::new(
            next_enrollment_id(),
            request.consumer_id.clone(),
            request.kind,
            request.effective_on,
        )
        .with_windows(request.enrollment_windows);
        let determination = self.evaluator.evaluate(&consumer.verification, &enrollment);
        enrollment.set_outstanding(determination.outstanding);

        let record = EnrollmentRecord {
            enrollment,
            version: 1,
        };
        let audit = vec![AuditRecord {
            entity_kind: EntityKind::Enrollment,
            entity_id: record.enrollment.id().0.clone(),
            from_state: None,
            to_state: record.enrollment.state().label().to_string(),
            triggering_event: "open_enrollment".to_string(),
            actor_id: SYSTEM_ACTOR.to_string(),
            occurred_at: self.clock.now(),
        }];

        let entries = self
            .repository
            .commit(CommitBatch {
                consumer: None,
                enrollments: vec![VersionedWrite {
                    expected_version: None,
                    record: record.clone(),
                }],
                audit,
            })
            .map_err(WorkflowError::from_repository)?;

        info!(
            consumer_id = %request.consumer_id,
            enrollment_id = %record.enrollment.id(),
            kind = record.enrollment.kind().label(),
            "enrollment opened"
        );
        Ok(WorkflowOutcome {
            consumer: Some(consumer),
            enrollments: vec![record],
            audit: entries,
            events: Vec::new(),
        })
    }

    /// Coverage purchase: kicks off verification for a consumer still in `unverified`.
    pub fn purchase_coverage(
        &self,
        purchase: CoveragePurchased,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.with_consumer(&purchase.consumer_id, purchase.expected_version, |pass| {
            self.apply_verification(
                pass,
                &VerificationEvent::CoveragePurchased {
                    residency_known: purchase.residency_known,
                },
                SYSTEM_ACTOR,
                None,
            )?;
            Ok(Scope::All)
        })
    }

    pub fn handle_verification_response(
        &self,
        message: VerificationResponseReceived,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let authority = message.response.authority();
        debug!(
            consumer_id = %message.consumer_id,
            authority = authority.label(),
            received_at = %message.received_at,
            "verification response received"
        );

        let actor = message.authority.clone();
        let event = message.response.into_event();
        self.with_consumer(&message.consumer_id, message.expected_version, |pass| {
            self.apply_verification(pass, &event, &actor, Some(authority))?;
            Ok(Scope::All)
        })
    }

    pub fn handle_admin_override(
        &self,
        message: AdminVerificationOverride,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let event = message.to_event();
        self.with_consumer(&message.consumer_id, message.expected_version, |pass| {
            self.apply_verification(pass, &event, &message.actor_id, None)?;
            Ok(Scope::All)
        })
    }

    /// Replace one identity field. When the consumer holds active gated coverage,
    /// verification is re-determined from scratch.
    pub fn handle_sensitive_field_change(
        &self,
        message: SensitiveFieldChanged,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.with_consumer(&message.consumer_id, message.expected_version, |pass| {
            let current = pass.consumer.verification.identity().clone();
            let stale = match current.with_change(message.field, message.old_value.as_deref()) {
                Ok(rebuilt) => rebuilt != current,
                Err(_) => true,
            };
            if stale {
                return Err(WorkflowError::StaleIdentity {
                    consumer_id: message.consumer_id.clone(),
                    field: message.field.label(),
                });
            }

            let next_identity = current.with_change(message.field, message.new_value.as_deref())?;
            if next_identity == current {
                return Ok(Scope::All);
            }

            let state = pass.consumer.verification.state();
            let next = pass
                .consumer
                .verification
                .with_identity(next_identity)
                .map_err(|violation| {
                    WorkflowError::inconsistent_ledger(&message.consumer_id, violation.field)
                })?;
            pass.consumer.verification = next;
            pass.consumer_changed = true;
            pass.audit.push(self.consumer_audit(
                &pass.consumer.consumer_id,
                state.label(),
                state.label(),
                SENSITIVE_FIELD_CHANGED,
                SYSTEM_ACTOR,
            ));

            let holds_gated_coverage = pass.enrollments.iter().any(|tracked| {
                let enrollment = &tracked.record.enrollment;
                enrollment.state().is_active() && self.evaluator.config().gates(enrollment.kind())
            });
            if holds_gated_coverage {
                let residency_known = pass
                    .consumer
                    .verification
                    .ledger()
                    .residency_status()
                    .is_known();
                info!(
                    consumer_id = %message.consumer_id,
                    field = message.field.label(),
                    "re-determining verification after sensitive field change"
                );
                self.apply_verification(
                    pass,
                    &VerificationEvent::Revert {
                        reason: SENSITIVE_FIELD_CHANGED.to_string(),
                    },
                    SYSTEM_ACTOR,
                    None,
                )?;
                self.apply_verification(
                    pass,
                    &VerificationEvent::CoveragePurchased { residency_known },
                    SYSTEM_ACTOR,
                    None,
                )?;
            }
            Ok(Scope::All)
        })
    }

    pub fn handle_enrollment_action(
        &self,
        action: EnrollmentAction,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let consumer_id = self
            .repository
            .fetch_enrollment(&action.enrollment_id)?
            .ok_or_else(|| WorkflowError::EnrollmentNotFound(action.enrollment_id.clone()))?
            .enrollment
            .consumer_id()
            .clone();

        self.with_consumer(&consumer_id, None, |pass| {
            let index = pass
                .position(&action.enrollment_id)
                .ok_or_else(|| WorkflowError::EnrollmentNotFound(action.enrollment_id.clone()))?;
            let tracked = &pass.enrollments[index];
            check_expected_version(
                &action.enrollment_id.0,
                action.expected_version,
                tracked.record.version,
            )?;

            let event = action
                .to_event()
                .map_err(|parameter| WorkflowError::MissingParameter {
                    action: action.action.label(),
                    parameter,
                })?;

            let Some(event) = event else {
                return self.reinstate(pass, index, &action.actor_id);
            };

            let transition = self
                .enrollment
                .apply(&tracked.record.enrollment, &event, action.admin, self.clock.as_ref())
                .map_err(|err| WorkflowError::from_enrollment(&action.enrollment_id, err))?;
            self.record_enrollment(pass, index, transition, &action.actor_id);
            Ok(Scope::Only(action.enrollment_id.clone()))
        })
    }

    /// Move every consumer whose verification period has elapsed to
    /// `verification_period_ended`. Consumers still inside their period are skipped.
    pub fn expire_verification_periods(
        &self,
        limit: usize,
    ) -> Result<Vec<WorkflowOutcome>, WorkflowError> {
        let mut outcomes = Vec::new();
        for candidate in self.repository.outstanding(limit)? {
            let result = self.with_consumer(&candidate.consumer_id, None, |pass| {
                self.apply_verification(
                    pass,
                    &VerificationEvent::VerificationPeriodExpired,
                    SYSTEM_ACTOR,
                    None,
                )?;
                Ok(Scope::All)
            });

            match result {
                Ok(outcome) if !outcome.is_noop() => outcomes.push(outcome),
                Ok(_) => {}
                Err(WorkflowError::InvalidTransition { entity, from, .. }) => {
                    debug!(consumer_id = %entity, state = %from, "verification period still open");
                }
                Err(err) => return Err(err),
            }
        }
        info!(expired = outcomes.len(), "verification period sweep finished");
        Ok(outcomes)
    }

    pub fn consumer_status(
        &self,
        consumer_id: &ConsumerId,
    ) -> Result<ConsumerStatusView, WorkflowError> {
        let record = self
            .repository
            .fetch_consumer(consumer_id)?
            .ok_or_else(|| WorkflowError::ConsumerNotFound(consumer_id.clone()))?;

        let now = self.clock.now();
        let window = Duration::hours(i64::from(self.config.upstream_response_window_hours));
        let awaiting_upstream = record
            .pending_requests
            .iter()
            .map(|request| AwaitingUpstream {
                authority: request.authority,
                requested_at: request.requested_at,
                overdue: now - request.requested_at > window,
            })
            .collect();

        let verification = &record.verification;
        Ok(ConsumerStatusView {
            consumer_id: record.consumer_id.clone(),
            state: verification.state().label(),
            version: record.version,
            ledger: verification.ledger().clone(),
            unresolved_tracks: verification.ledger().unresolved_tracks(),
            verification_due_on: verification
                .verification_due_on(self.verification.verification_period_days()),
            awaiting_upstream,
        })
    }

    pub fn enrollment_status(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<EnrollmentStatusView, WorkflowError> {
        let record = self
            .repository
            .fetch_enrollment(enrollment_id)?
            .ok_or_else(|| WorkflowError::EnrollmentNotFound(enrollment_id.clone()))?;
        let enrollment = &record.enrollment;

        let reselected = matches!(
            enrollment.state(),
            EnrollmentState::RenewingCoverageSelected
                | EnrollmentState::RenewingTransmitted
                | EnrollmentState::RenewingCoverageEnrolled
        );
        let active_renewal = reselected
            && self.repository.was_ever_in(
                EntityKind::Enrollment,
                &enrollment_id.0,
                EnrollmentState::AutoRenewing.label(),
            )?;

        Ok(EnrollmentStatusView {
            enrollment_id: enrollment.id().clone(),
            consumer_id: enrollment.consumer_id().clone(),
            kind: enrollment.kind(),
            state: enrollment.state().label(),
            is_outstanding: enrollment.is_outstanding(),
            effective_on: enrollment.effective_on(),
            terminated_on: enrollment.terminated_on(),
            predecessor_id: enrollment.predecessor_id().cloned(),
            active_renewal,
            version: record.version,
        })
    }

    pub fn audit_trail(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<AuditEntry>, WorkflowError> {
        Ok(self.repository.audit_entries(kind, entity_id)?)
    }

    /// Lock the consumer, load it with its enrollments, run `mutate`, re-evaluate
    /// eligibility and commit everything that changed in one batch.
    fn with_consumer<F>(
        &self,
        consumer_id: &ConsumerId,
        expected_version: Option<u64>,
        mutate: F,
    ) -> Result<WorkflowOutcome, WorkflowError>
    where
        F: FnOnce(&mut Pass) -> Result<Scope, WorkflowError>,
    {
        self.locks.with_lock(&consumer_id.0, || {
            self.load_and_commit(consumer_id, expected_version, mutate)
        })
    }

    fn load_and_commit<F>(
        &self,
        consumer_id: &ConsumerId,
        expected_version: Option<u64>,
        mutate: F,
    ) -> Result<WorkflowOutcome, WorkflowError>
    where
        F: FnOnce(&mut Pass) -> Result<Scope, WorkflowError>,
    {
        let consumer = self
            .repository
            .fetch_consumer(consumer_id)?
            .ok_or_else(|| WorkflowError::ConsumerNotFound(consumer_id.clone()))?;
        check_expected_version(&consumer_id.0, expected_version, consumer.version)?;

        let enrollments = self
            .repository
            .enrollments_for(consumer_id)?
            .into_iter()
            .map(|record| TrackedEnrollment {
                stored_version: Some(record.version),
                record,
                touched: false,
            })
            .collect();

        let mut pass = Pass {
            consumer,
            consumer_changed: false,
            enrollments,
            audit: Vec::new(),
            events: Vec::new(),
            flipped: Vec::new(),
        };

        let scope = mutate(&mut pass)?;
        self.reconcile(&mut pass, &scope);
        self.commit(pass)
    }

    /// Apply one verification event to the working consumer. Replays that change nothing
    /// leave the pass untouched.
    fn apply_verification(
        &self,
        pass: &mut Pass,
        event: &VerificationEvent,
        actor: &str,
        responding: Option<VerificationAuthority>,
    ) -> Result<(), WorkflowError> {
        let consumer_id = pass.consumer.consumer_id.clone();
        let transition = self
            .verification
            .apply(&pass.consumer.verification, event, self.clock.as_ref())
            .map_err(|err| WorkflowError::from_verification(&consumer_id, err))?;

        if !transition.changed {
            debug!(consumer_id = %consumer_id, event = transition.event, "verification replay ignored");
            return Ok(());
        }

        pass.consumer.verification = transition.verification;
        pass.consumer_changed = true;
        pass.audit.push(self.consumer_audit(
            &consumer_id,
            transition.from.label(),
            transition.to.label(),
            transition.event,
            actor,
        ));
        if transition.from != transition.to {
            pass.events.push(IntegrationEvent::VerificationStateChanged {
                consumer_id: consumer_id.clone(),
                from: transition.from.label().to_string(),
                to: transition.to.label().to_string(),
            });
        }

        let pending = &mut pass.consumer.pending_requests;
        if matches!(event, VerificationEvent::Revert { .. }) {
            pending.clear();
        }
        if let Some(authority) = responding {
            pending.retain(|request| request.authority != authority);
        }
        for intent in transition.intents {
            let authority = intent.authority();
            if pending.iter().all(|request| request.authority != authority) {
                pending.push(PendingRequest {
                    authority,
                    requested_at: self.clock.now(),
                });
            }
            pass.events.push(IntegrationEvent::VerificationRequested {
                consumer_id: consumer_id.clone(),
                authority,
            });
        }
        Ok(())
    }

    fn reinstate(
        &self,
        pass: &mut Pass,
        index: usize,
        actor: &str,
    ) -> Result<Scope, WorkflowError> {
        let predecessor = &pass.enrollments[index].record.enrollment;
        let already_reinstated = pass
            .enrollments
            .iter()
            .any(|tracked| tracked.record.enrollment.predecessor_id() == Some(predecessor.id()));
        if already_reinstated {
            return Err(WorkflowError::InvalidTransition {
                entity: predecessor.id().0.clone(),
                from: predecessor.state().label().to_string(),
                event: "reinstate".to_string(),
            });
        }
        let mut successor = Enrollment::reinstatement_of(predecessor, next_enrollment_id()).map_err(
            |err| WorkflowError::InvalidTransition {
                entity: err.enrollment_id.0.clone(),
                from: err.state.label().to_string(),
                event: "reinstate".to_string(),
            },
        )?;
        let determination = self
            .evaluator
            .evaluate(&pass.consumer.verification, &successor);
        successor.set_outstanding(determination.outstanding);

        let successor_id = successor.id().clone();
        pass.audit.push(AuditRecord {
            entity_kind: EntityKind::Enrollment,
            entity_id: successor_id.0.clone(),
            from_state: None,
            to_state: successor.state().label().to_string(),
            triggering_event: "reinstate".to_string(),
            actor_id: actor.to_string(),
            occurred_at: self.clock.now(),
        });
        pass.events.push(IntegrationEvent::EnrollmentStateChanged {
            enrollment_id: successor_id.clone(),
            from: None,
            to: successor.state().label().to_string(),
            event: "reinstate".to_string(),
        });
        pass.enrollments.push(TrackedEnrollment {
            record: EnrollmentRecord {
                enrollment: successor,
                version: 0,
            },
            stored_version: None,
            touched: true,
        });
        Ok(Scope::Only(successor_id))
    }

    /// Re-run the evaluator and apply the recommended enrollment transitions whose guards
    /// hold. Terminal enrollments keep their last flag.
    fn reconcile(&self, pass: &mut Pass, scope: &Scope) {
        for index in 0..pass.enrollments.len() {
            let enrollment = &pass.enrollments[index].record.enrollment;
            if enrollment.state().is_terminal() {
                continue;
            }
            if let Scope::Only(id) = scope {
                if enrollment.id() != id {
                    continue;
                }
            }

            let determination = self
                .evaluator
                .evaluate(&pass.consumer.verification, enrollment);
            if !determination.flipped {
                continue;
            }

            let tracked = &mut pass.enrollments[index];
            tracked.record.enrollment.set_outstanding(determination.outstanding);
            tracked.touched = true;
            let enrollment_id = tracked.record.enrollment.id().clone();
            pass.flipped.push(enrollment_id.clone());

            let Some(event) = determination.recommended_event else {
                continue;
            };
            let attempt = self.enrollment.apply(
                &pass.enrollments[index].record.enrollment,
                &event,
                false,
                self.clock.as_ref(),
            );
            match attempt {
                Ok(transition) => self.record_enrollment(pass, index, transition, SYSTEM_ACTOR),
                Err(err) => debug!(
                    enrollment_id = %enrollment_id,
                    error = %err,
                    "recommended enrollment transition not applicable"
                ),
            }
        }
    }

    fn record_enrollment(
        &self,
        pass: &mut Pass,
        index: usize,
        transition: EnrollmentTransition,
        actor: &str,
    ) {
        if !transition.changed {
            return;
        }
        let id = transition.enrollment.id().clone();
        pass.audit.push(AuditRecord {
            entity_kind: EntityKind::Enrollment,
            entity_id: id.0.clone(),
            from_state: Some(transition.from.label().to_string()),
            to_state: transition.to.label().to_string(),
            triggering_event: transition.event.to_string(),
            actor_id: actor.to_string(),
            occurred_at: self.clock.now(),
        });
        if transition.from != transition.to {
            pass.events.push(IntegrationEvent::EnrollmentStateChanged {
                enrollment_id: id,
                from: Some(transition.from.label().to_string()),
                to: transition.to.label().to_string(),
                event: transition.event.to_string(),
            });
        }

        let tracked = &mut pass.enrollments[index];
        tracked.record.enrollment = transition.enrollment;
        tracked.touched = true;
    }

    fn commit(&self, pass: Pass) -> Result<WorkflowOutcome, WorkflowError> {
        let Pass {
            mut consumer,
            consumer_changed,
            enrollments,
            audit,
            mut events,
            flipped,
        } = pass;

        let touched: Vec<_> = enrollments
            .into_iter()
            .filter(|tracked| tracked.touched)
            .collect();
        if !consumer_changed && touched.is_empty() && audit.is_empty() {
            return Ok(WorkflowOutcome {
                consumer: Some(consumer),
                ..WorkflowOutcome::default()
            });
        }

        let consumer_write = if consumer_changed {
            let expected_version = Some(consumer.version);
            consumer.version += 1;
            Some(VersionedWrite {
                expected_version,
                record: consumer.clone(),
            })
        } else {
            None
        };

        let mut enrollment_writes = Vec::with_capacity(touched.len());
        let mut enrollment_records = Vec::with_capacity(touched.len());
        for tracked in touched {
            let mut record = tracked.record;
            record.version = tracked.stored_version.map_or(1, |version| version + 1);
            enrollment_records.push(record.clone());
            enrollment_writes.push(VersionedWrite {
                expected_version: tracked.stored_version,
                record,
            });
        }

        if !flipped.is_empty() {
            events.push(IntegrationEvent::EligibilityChanged {
                consumer_id: consumer.consumer_id.clone(),
                enrollment_ids_affected: flipped,
            });
        }

        let entries = self
            .repository
            .commit(CommitBatch {
                consumer: consumer_write,
                enrollments: enrollment_writes,
                audit,
            })
            .map_err(WorkflowError::from_repository)?;

        info!(
            consumer_id = %consumer.consumer_id,
            state = consumer.verification.state().label(),
            version = consumer.version,
            enrollments = enrollment_records.len(),
            audit_entries = entries.len(),
            "workflow changes committed"
        );
        Ok(WorkflowOutcome {
            consumer: Some(consumer),
            enrollments: enrollment_records,
            audit: entries,
            events,
        })
    }

    fn consumer_audit(
        &self,
        consumer_id: &ConsumerId,
        from: &str,
        to: &str,
        event: &str,
        actor: &str,
    ) -> AuditRecord {
        AuditRecord {
            entity_kind: EntityKind::Consumer,
            entity_id: consumer_id.0.clone(),
            from_state: Some(from.to_string()),
            to_state: to.to_string(),
            triggering_event: event.to_string(),
            actor_id: actor.to_string(),
            occurred_at: self.clock.now(),
        }
    }
}

fn check_expected_version(
    entity: &str,
    expected: Option<u64>,
    actual: u64,
) -> Result<(), WorkflowError> {
    match expected {
        Some(expected) if expected != actual => Err(WorkflowError::ConcurrentModification {
            entity: entity.to_string(),
            expected_version: expected,
            actual_version: actual,
        }),
        _ => Ok(()),
    }
}

/// Error raised by the workflow orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("event '{event}' is not permitted for {entity} in state '{from}'")]
    InvalidTransition {
        entity: String,
        from: String,
        event: String,
    },
    #[error("{entity} was modified concurrently: expected version {expected_version}, found {actual_version}")]
    ConcurrentModification {
        entity: String,
        expected_version: u64,
        actual_version: u64,
    },
    #[error("verification ledger for {consumer_id} is inconsistent at '{field}'")]
    InconsistentLedger {
        consumer_id: ConsumerId,
        field: &'static str,
    },
    #[error("consumer {0} not found")]
    ConsumerNotFound(ConsumerId),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("old value for '{field}' does not match the identity on file for {consumer_id}")]
    StaleIdentity {
        consumer_id: ConsumerId,
        field: &'static str,
    },
    #[error(transparent)]
    InvalidIdentity(#[from] IdentityError),
    #[error("action '{action}' requires parameter '{parameter}'")]
    MissingParameter {
        action: &'static str,
        parameter: &'static str,
    },
    #[error("event '{event}' requires an administrator")]
    AdminRequired { event: &'static str },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    fn inconsistent_ledger(consumer_id: &ConsumerId, field: &'static str) -> Self {
        error!(consumer_id = %consumer_id, field, "verification ledger integrity violated");
        Self::InconsistentLedger {
            consumer_id: consumer_id.clone(),
            field,
        }
    }

    fn from_verification(consumer_id: &ConsumerId, err: VerificationError) -> Self {
        match err {
            VerificationError::InvalidTransition { from, event } => Self::InvalidTransition {
                entity: consumer_id.0.clone(),
                from: from.label().to_string(),
                event: event.to_string(),
            },
            VerificationError::InconsistentLedger(violation) => {
                Self::inconsistent_ledger(consumer_id, violation.field)
            }
        }
    }

    fn from_enrollment(enrollment_id: &EnrollmentId, err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::InvalidTransition { from, event } => Self::InvalidTransition {
                entity: enrollment_id.0.clone(),
                from: from.label().to_string(),
                event: event.to_string(),
            },
            EnrollmentError::AdminRequired { event } => Self::AdminRequired { event },
        }
    }

    fn from_repository(err: RepositoryError) -> Self {
        match err {
            RepositoryError::VersionMismatch {
                entity,
                expected,
                actual,
            } => Self::ConcurrentModification {
                entity,
                expected_version: expected,
                actual_version: actual,
            },
            other => Self::Repository(other),
        }
    }
}
