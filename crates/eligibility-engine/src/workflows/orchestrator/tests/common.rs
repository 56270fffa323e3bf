use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use axum::Router;
use chrono::NaiveDate;
use serde_json::Value;

use crate::clock::{ClockSource, FixedClock};
use crate::config::WorkflowConfig;
use crate::workflows::audit::{AuditEntry, EntityKind};
use crate::workflows::eligibility::EligibilityConfig;
use crate::workflows::enrollment::{EnrollmentId, EnrollmentKind, EnrollmentState};
use crate::workflows::orchestrator::{
    workflow_router, CommitBatch, ConsumerRecord, ConsumerRegistration, CoveragePurchased,
    EnrollmentAction, EnrollmentActionKind, EnrollmentActionParams, EnrollmentRecord,
    EnrollmentRequest, EventDispatcher, IntegrationEvent, IntegrationEventPublisher,
    MemoryWorkflowRepository, PublishError, RepositoryError, VerificationResponse,
    VerificationResponseReceived, WorkflowOrchestrator, WorkflowOutcome, WorkflowRepository,
};
use crate::workflows::verification::{
    CitizenStatus, ConsumerId, ConsumerVerificationState, Identity, ResidencyStatus,
};

pub(super) fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date")
}

pub(super) type MemoryOrchestrator = WorkflowOrchestrator<MemoryWorkflowRepository>;

pub(super) struct Harness {
    pub orchestrator: Arc<MemoryOrchestrator>,
    pub clock: Arc<FixedClock>,
}

pub(super) fn harness() -> Harness {
    let clock = Arc::new(FixedClock::on(start_date()));
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        Arc::new(MemoryWorkflowRepository::new()),
        clock.clone(),
        WorkflowConfig::default(),
        EligibilityConfig::default(),
    ));
    Harness {
        orchestrator,
        clock,
    }
}

pub(super) fn citizen_with_ssn() -> Identity {
    Identity {
        first_name: "Maria".to_string(),
        last_name: "Delgado".to_string(),
        dob: NaiveDate::from_ymd_opt(1985, 2, 11).expect("valid dob"),
        ssn: Some("123456789".to_string()),
        citizen_status: CitizenStatus::UsCitizen,
        tribal_id: None,
    }
}

pub(super) fn native_without_ssn() -> Identity {
    Identity {
        first_name: "Joseph".to_string(),
        last_name: "Tsosie".to_string(),
        dob: NaiveDate::from_ymd_opt(1990, 8, 30).expect("valid dob"),
        ssn: None,
        citizen_status: CitizenStatus::IndianTribeMember,
        tribal_id: Some("NAV-4471".to_string()),
    }
}

impl Harness {
    pub fn register(&self, identity: Identity, residency: ResidencyStatus) -> ConsumerId {
        self.orchestrator
            .register_consumer(ConsumerRegistration {
                identity,
                residency,
            })
            .expect("registration succeeds")
            .consumer
            .expect("consumer returned")
            .consumer_id
    }

    pub fn open(&self, consumer_id: &ConsumerId, kind: EnrollmentKind) -> EnrollmentId {
        let outcome = self
            .orchestrator
            .open_enrollment(EnrollmentRequest {
                consumer_id: consumer_id.clone(),
                kind,
                effective_on: NaiveDate::from_ymd_opt(2025, 2, 1).expect("valid date"),
                enrollment_windows: Vec::new(),
            })
            .expect("enrollment opens");
        outcome.enrollments[0].enrollment.id().clone()
    }

    pub fn purchase(&self, consumer_id: &ConsumerId) -> WorkflowOutcome {
        self.orchestrator
            .purchase_coverage(CoveragePurchased {
                consumer_id: consumer_id.clone(),
                residency_known: true,
                expected_version: None,
            })
            .expect("purchase accepted")
    }

    pub fn respond(
        &self,
        consumer_id: &ConsumerId,
        response: VerificationResponse,
    ) -> WorkflowOutcome {
        let message = response_message(consumer_id, response, self.clock.as_ref());
        self.orchestrator
            .handle_verification_response(message)
            .expect("response accepted")
    }

    pub fn act(
        &self,
        enrollment_id: &EnrollmentId,
        action: EnrollmentActionKind,
    ) -> WorkflowOutcome {
        self.orchestrator
            .handle_enrollment_action(action_message(enrollment_id, action))
            .unwrap_or_else(|err| panic!("{} refused: {err}", action.label()))
    }

    /// Register a citizen with valid residency and carry them to `fully_verified`.
    pub fn verified_consumer(&self) -> ConsumerId {
        let consumer_id = self.register(citizen_with_ssn(), ResidencyStatus::Valid);
        self.purchase(&consumer_id);
        self.respond(&consumer_id, VerificationResponse::SsnAndCitizenshipValid);
        assert_eq!(
            self.consumer(&consumer_id).verification.state(),
            ConsumerVerificationState::FullyVerified
        );
        consumer_id
    }

    pub fn consumer(&self, consumer_id: &ConsumerId) -> ConsumerRecord {
        self.orchestrator
            .repository()
            .fetch_consumer(consumer_id)
            .expect("repository available")
            .expect("consumer stored")
    }

    pub fn enrollment(&self, enrollment_id: &EnrollmentId) -> EnrollmentRecord {
        self.orchestrator
            .repository()
            .fetch_enrollment(enrollment_id)
            .expect("repository available")
            .expect("enrollment stored")
    }

    pub fn enrollment_state(&self, enrollment_id: &EnrollmentId) -> EnrollmentState {
        self.enrollment(enrollment_id).enrollment.state()
    }

    pub fn audit(&self, kind: EntityKind, entity_id: &str) -> Vec<AuditEntry> {
        self.orchestrator
            .audit_trail(kind, entity_id)
            .expect("audit readable")
    }
}

pub(super) fn response_message(
    consumer_id: &ConsumerId,
    response: VerificationResponse,
    clock: &FixedClock,
) -> VerificationResponseReceived {
    VerificationResponseReceived {
        consumer_id: consumer_id.clone(),
        authority: format!("{}-gateway", response.authority().label()),
        response,
        received_at: clock.now(),
        expected_version: None,
    }
}

pub(super) fn action_message(
    enrollment_id: &EnrollmentId,
    action: EnrollmentActionKind,
) -> EnrollmentAction {
    EnrollmentAction {
        enrollment_id: enrollment_id.clone(),
        action,
        params: EnrollmentActionParams::default(),
        actor_id: "broker-17".to_string(),
        admin: false,
        expected_version: None,
    }
}

/// Publisher double collecting delivered events, optionally failing every delivery.
#[derive(Default)]
pub(super) struct RecordingPublisher {
    pub events: Mutex<Vec<IntegrationEvent>>,
    pub fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn delivered(&self) -> Vec<IntegrationEvent> {
        self.events.lock().expect("publisher lock").clone()
    }
}

impl IntegrationEventPublisher for RecordingPublisher {
    fn publish(&self, event: &IntegrationEvent) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Transport("broker offline".to_string()));
        }
        self.events.lock().expect("publisher lock").push(event.clone());
        Ok(())
    }
}

/// Repository whose every call fails, for exercising 500 responses.
pub(super) struct UnavailableRepository;

impl WorkflowRepository for UnavailableRepository {
    fn fetch_consumer(&self, _: &ConsumerId) -> Result<Option<ConsumerRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance window".to_string()))
    }

    fn fetch_enrollment(
        &self,
        _: &EnrollmentId,
    ) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance window".to_string()))
    }

    fn enrollments_for(&self, _: &ConsumerId) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance window".to_string()))
    }

    fn outstanding(&self, _: usize) -> Result<Vec<ConsumerRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance window".to_string()))
    }

    fn commit(&self, _: CommitBatch) -> Result<Vec<AuditEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance window".to_string()))
    }

    fn audit_entries(&self, _: EntityKind, _: &str) -> Result<Vec<AuditEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance window".to_string()))
    }

    fn was_ever_in(&self, _: EntityKind, _: &str, _: &str) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance window".to_string()))
    }
}

pub(super) fn router_for(harness: &Harness) -> (Router, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let dispatcher = Arc::new(EventDispatcher::new(publisher.clone()));
    (
        workflow_router(harness.orchestrator.clone(), dispatcher),
        publisher,
    )
}

pub(super) async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}
