//! End-to-end verification behavior driven through the public orchestrator facade.
//!
//! Each scenario registers consumers against the in-memory repository on a fixed clock and
//! asserts on the committed records, the audit trail and the outbound integration events.

mod common {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use eligibility_engine::clock::{ClockSource, FixedClock};
    use eligibility_engine::config::WorkflowConfig;
    use eligibility_engine::workflows::eligibility::EligibilityConfig;
    use eligibility_engine::workflows::enrollment::{EnrollmentId, EnrollmentKind};
    use eligibility_engine::workflows::orchestrator::{
        AdminVerificationOverride, ConsumerRecord, ConsumerRegistration, CoveragePurchased,
        EnrollmentAction, EnrollmentActionKind, EnrollmentActionParams, EnrollmentRecord,
        EnrollmentRequest, MemoryWorkflowRepository, OverrideAction, VerificationResponse,
        VerificationResponseReceived, WorkflowError, WorkflowOrchestrator, WorkflowOutcome,
        WorkflowRepository,
    };
    use eligibility_engine::workflows::verification::{
        CitizenStatus, ConsumerId, Identity, ResidencyStatus, VerificationTrack,
    };

    pub(super) struct World {
        pub orchestrator: WorkflowOrchestrator<MemoryWorkflowRepository>,
        pub clock: Arc<FixedClock>,
    }

    pub(super) fn world() -> World {
        let clock = Arc::new(FixedClock::on(
            NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date"),
        ));
        World {
            orchestrator: WorkflowOrchestrator::new(
                Arc::new(MemoryWorkflowRepository::new()),
                clock.clone(),
                WorkflowConfig::default(),
                EligibilityConfig::default(),
            ),
            clock,
        }
    }

    pub(super) fn citizen() -> Identity {
        Identity {
            first_name: "Lena".to_string(),
            last_name: "Whitfield".to_string(),
            dob: NaiveDate::from_ymd_opt(1979, 6, 4).expect("valid dob"),
            ssn: Some("987654321".to_string()),
            citizen_status: CitizenStatus::UsCitizen,
            tribal_id: None,
        }
    }

    pub(super) fn tribe_member_without_ssn() -> Identity {
        Identity {
            first_name: "Ada".to_string(),
            last_name: "Begay".to_string(),
            dob: NaiveDate::from_ymd_opt(2001, 11, 19).expect("valid dob"),
            ssn: None,
            citizen_status: CitizenStatus::IndianTribeMember,
            tribal_id: Some("HOPI-0192".to_string()),
        }
    }

    impl World {
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
            self.orchestrator
                .open_enrollment(EnrollmentRequest {
                    consumer_id: consumer_id.clone(),
                    kind,
                    effective_on: NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date"),
                    enrollment_windows: Vec::new(),
                })
                .expect("enrollment opens")
                .enrollments[0]
                .enrollment
                .id()
                .clone()
        }

        pub fn select(&self, enrollment_id: &EnrollmentId) -> WorkflowOutcome {
            self.orchestrator
                .handle_enrollment_action(EnrollmentAction {
                    enrollment_id: enrollment_id.clone(),
                    action: EnrollmentActionKind::Select,
                    params: EnrollmentActionParams::default(),
                    actor_id: "navigator-3".to_string(),
                    admin: false,
                    expected_version: None,
                })
                .expect("selection accepted")
        }

        pub fn purchase(
            &self,
            consumer_id: &ConsumerId,
            residency_known: bool,
        ) -> WorkflowOutcome {
            self.orchestrator
                .purchase_coverage(CoveragePurchased {
                    consumer_id: consumer_id.clone(),
                    residency_known,
                    expected_version: None,
                })
                .expect("purchase accepted")
        }

        pub fn respond(
            &self,
            consumer_id: &ConsumerId,
            response: VerificationResponse,
        ) -> Result<WorkflowOutcome, WorkflowError> {
            self.orchestrator
                .handle_verification_response(VerificationResponseReceived {
                    consumer_id: consumer_id.clone(),
                    authority: format!("{}-hub", response.authority().label()),
                    response,
                    received_at: self.clock.now(),
                    expected_version: None,
                })
        }

        pub fn admin(
            &self,
            consumer_id: &ConsumerId,
            track: VerificationTrack,
            action: OverrideAction,
        ) -> Result<WorkflowOutcome, WorkflowError> {
            self.orchestrator
                .handle_admin_override(AdminVerificationOverride {
                    consumer_id: consumer_id.clone(),
                    track,
                    action,
                    reason: "caseworker review".to_string(),
                    actor_id: "admin-12".to_string(),
                    expected_version: None,
                })
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
    }
}

use common::*;
use eligibility_engine::workflows::audit::EntityKind;
use eligibility_engine::workflows::enrollment::{EnrollmentKind, EnrollmentState};
use eligibility_engine::workflows::orchestrator::{
    IntegrationEvent, OverrideAction, VerificationResponse, WorkflowError,
};
use eligibility_engine::workflows::verification::{
    check_ledger, ConsumerId, ConsumerVerificationState, ResidencyOutcome, ResidencyStatus,
    TrackStatus, VerificationAuthority, VerificationTrack, NO_SSN_FOR_NATIVE,
};

fn awaiting(world: &World, consumer_id: &ConsumerId) -> Vec<VerificationAuthority> {
    world
        .consumer(consumer_id)
        .pending_requests
        .iter()
        .map(|request| request.authority)
        .collect()
}

#[test]
fn citizen_with_ssn_reaches_sci_verified_through_ssa_and_dhs() {
    let world = world();
    let consumer_id = world.register(citizen(), ResidencyStatus::Unset);

    let purchased = world.purchase(&consumer_id, false);
    assert_eq!(
        purchased
            .consumer
            .as_ref()
            .expect("consumer committed")
            .verification
            .state(),
        ConsumerVerificationState::SsaPending
    );
    assert_eq!(
        awaiting(&world, &consumer_id),
        vec![VerificationAuthority::Ssa, VerificationAuthority::LocalResidency]
    );

    world
        .respond(
            &consumer_id,
            VerificationResponse::Ssa {
                ssn_valid: true,
                citizenship_valid: Some(false),
            },
        )
        .expect("ssa response accepted");
    assert_eq!(
        world.consumer(&consumer_id).verification.state(),
        ConsumerVerificationState::DhsPending
    );
    assert_eq!(
        awaiting(&world, &consumer_id),
        vec![VerificationAuthority::LocalResidency, VerificationAuthority::Dhs]
    );

    let outcome = world
        .respond(
            &consumer_id,
            VerificationResponse::Dhs {
                authorized: true,
                document_ref: Some("I-94".to_string()),
            },
        )
        .expect("dhs response accepted");
    let record = outcome.consumer.expect("consumer committed");
    assert_eq!(
        record.verification.state(),
        ConsumerVerificationState::SciVerified
    );
    assert_eq!(
        record.verification.ledger().lawful_presence().vlp_document_ref.as_deref(),
        Some("I-94")
    );
    assert_eq!(
        awaiting(&world, &consumer_id),
        vec![VerificationAuthority::LocalResidency]
    );
    assert!(outcome.events.contains(&IntegrationEvent::VerificationStateChanged {
        consumer_id: consumer_id.clone(),
        from: "dhs_pending".to_string(),
        to: "sci_verified".to_string(),
    }));

    let trail = world
        .orchestrator
        .audit_trail(EntityKind::Consumer, &consumer_id.0)
        .expect("audit readable");
    let steps: Vec<_> = trail
        .iter()
        .map(|entry| entry.to_state.as_str())
        .collect();
    assert_eq!(
        steps,
        vec!["unverified", "ssa_pending", "dhs_pending", "sci_verified"]
    );
    assert_eq!(trail[2].actor_id, "ssa-hub");
}

#[test]
fn native_without_ssn_is_outstanding_from_purchase() {
    let world = world();
    let consumer_id = world.register(tribe_member_without_ssn(), ResidencyStatus::Attested);

    let outcome = world.purchase(&consumer_id, true);

    let record = outcome.consumer.expect("consumer committed");
    assert_eq!(
        record.verification.state(),
        ConsumerVerificationState::VerificationOutstanding
    );
    let ledger = record.verification.ledger();
    assert_eq!(ledger.ssn_status(), TrackStatus::Outstanding);
    assert_eq!(ledger.ssn_update_reason(), Some(NO_SSN_FOR_NATIVE));
    assert!(record.pending_requests.is_empty());

    let status = world
        .orchestrator
        .consumer_status(&consumer_id)
        .expect("status readable");
    assert_eq!(
        status.verification_due_on,
        chrono::NaiveDate::from_ymd_opt(2025, 6, 6)
    );
    assert!(status.unresolved_tracks.contains(&VerificationTrack::Ssn));
}

#[test]
fn full_verification_clears_a_selected_enrollment_without_moving_it() {
    let world = world();
    let consumer_id = world.register(citizen(), ResidencyStatus::Valid);
    let enrollment_id = world.open(&consumer_id, EnrollmentKind::Individual);
    world.select(&enrollment_id);
    world.purchase(&consumer_id, true);
    world
        .respond(
            &consumer_id,
            VerificationResponse::Ssa {
                ssn_valid: false,
                citizenship_valid: None,
            },
        )
        .expect("ssa response accepted");
    assert!(world.enrollment(&enrollment_id).enrollment.is_outstanding());

    let outcome = world
        .respond(&consumer_id, VerificationResponse::SsnAndCitizenshipValid)
        .expect("combined response accepted");

    assert_eq!(
        world.consumer(&consumer_id).verification.state(),
        ConsumerVerificationState::FullyVerified
    );
    let enrollment = world.enrollment(&enrollment_id).enrollment;
    assert!(!enrollment.is_outstanding());
    assert_eq!(enrollment.state(), EnrollmentState::CoverageSelected);
    assert!(outcome.events.contains(&IntegrationEvent::EligibilityChanged {
        consumer_id: consumer_id.clone(),
        enrollment_ids_affected: vec![enrollment_id.clone()],
    }));
    assert!(!outcome
        .events
        .iter()
        .any(|event| matches!(event, IntegrationEvent::EnrollmentStateChanged { .. })));
}

#[test]
fn admin_rejection_reopens_every_gated_enrollment() {
    let world = world();
    let consumer_id = world.register(citizen(), ResidencyStatus::Valid);
    world.purchase(&consumer_id, true);
    world
        .respond(&consumer_id, VerificationResponse::SsnAndCitizenshipValid)
        .expect("combined response accepted");
    let individual = world.open(&consumer_id, EnrollmentKind::Individual);
    let coverall = world.open(&consumer_id, EnrollmentKind::Coverall);
    world.select(&individual);
    world.select(&coverall);

    let outcome = world
        .admin(&consumer_id, VerificationTrack::Ssn, OverrideAction::Reject)
        .expect("rejection accepted");

    let record = outcome.consumer.expect("consumer committed");
    assert_eq!(
        record.verification.state(),
        ConsumerVerificationState::VerificationOutstanding
    );
    assert!(record.verification.ledger().is_rejected(VerificationTrack::Ssn));
    for enrollment_id in [&individual, &coverall] {
        let enrollment = world.enrollment(enrollment_id).enrollment;
        assert!(enrollment.is_outstanding());
        assert_eq!(enrollment.state(), EnrollmentState::Unverified);
    }

    let trail = world
        .orchestrator
        .audit_trail(EntityKind::Consumer, &consumer_id.0)
        .expect("audit readable");
    let last = trail.last().expect("rejection audited");
    assert_eq!(last.triggering_event, "reject");
    assert_eq!(last.actor_id, "admin-12");
}

#[test]
fn repeated_rejection_commits_nothing() {
    let world = world();
    let consumer_id = world.register(citizen(), ResidencyStatus::Valid);
    world.purchase(&consumer_id, true);
    world
        .admin(&consumer_id, VerificationTrack::Ssn, OverrideAction::Reject)
        .expect("first rejection accepted");
    let before = world.consumer(&consumer_id);

    let outcome = world
        .admin(&consumer_id, VerificationTrack::Ssn, OverrideAction::Reject)
        .expect("replayed rejection accepted");

    assert!(outcome.is_noop());
    assert_eq!(world.consumer(&consumer_id), before);
}

#[test]
fn revert_after_purchase_restores_registration_defaults() {
    let world = world();
    let consumer_id = world.register(citizen(), ResidencyStatus::Unset);
    let registered = world.consumer(&consumer_id);
    world.purchase(&consumer_id, false);

    let outcome = world
        .admin(&consumer_id, VerificationTrack::Ssn, OverrideAction::Revert)
        .expect("revert accepted");

    let record = outcome.consumer.expect("consumer committed");
    assert_eq!(
        record.verification.state(),
        ConsumerVerificationState::Unverified
    );
    let before = registered.verification.ledger();
    let after = record.verification.ledger();
    assert_eq!(after.ssn_status(), before.ssn_status());
    assert_eq!(after.native_american_status(), before.native_american_status());
    assert_eq!(
        after.lawful_presence().verification_result,
        before.lawful_presence().verification_result
    );
    assert!(record.pending_requests.is_empty());
}

#[test]
fn responses_outside_their_pending_state_are_refused() {
    let world = world();
    let consumer_id = world.register(citizen(), ResidencyStatus::Valid);

    let err = world
        .respond(
            &consumer_id,
            VerificationResponse::Dhs {
                authorized: true,
                document_ref: None,
            },
        )
        .expect_err("dhs answer without a dhs request");

    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    assert_eq!(world.consumer(&consumer_id).version, 1);
}

#[test]
fn ledger_invariants_hold_after_every_committed_step() {
    let world = world();
    let citizen_id = world.register(citizen(), ResidencyStatus::Unset);
    let native_id = world.register(tribe_member_without_ssn(), ResidencyStatus::Attested);
    let enrollment_id = world.open(&citizen_id, EnrollmentKind::Individual);
    world.select(&enrollment_id);

    let check = |label: &str| {
        for consumer_id in [&citizen_id, &native_id] {
            let record = world.consumer(consumer_id);
            let verification = &record.verification;
            assert!(
                check_ledger(verification.identity(), verification.ledger()).is_ok(),
                "ledger invariant broken after {label} for {}",
                consumer_id.0
            );
            assert_eq!(
                verification.ledger().native_american_status() == TrackStatus::Na,
                !verification.identity().has_tribal_id(),
                "native status mirrors tribal id after {label}"
            );
        }
        let enrollment = world.enrollment(&enrollment_id).enrollment;
        let consumer = world.consumer(&citizen_id).verification;
        let complete = match consumer.state() {
            ConsumerVerificationState::FullyVerified => true,
            ConsumerVerificationState::SciVerified => consumer.ledger().all_tracks_verified(),
            _ => false,
        };
        if enrollment.is_outstanding() {
            assert!(!complete, "outstanding enrollment under a verified consumer after {label}");
        }
    };

    check("registration");
    world.purchase(&citizen_id, false);
    world.purchase(&native_id, true);
    check("purchase");
    world
        .respond(
            &citizen_id,
            VerificationResponse::Ssa {
                ssn_valid: true,
                citizenship_valid: Some(false),
            },
        )
        .expect("ssa response accepted");
    check("ssa response");
    world
        .respond(
            &citizen_id,
            VerificationResponse::Dhs {
                authorized: true,
                document_ref: None,
            },
        )
        .expect("dhs response accepted");
    check("dhs response");
    world
        .respond(
            &citizen_id,
            VerificationResponse::Residency {
                outcome: ResidencyOutcome::Authorized,
            },
        )
        .expect("residency response accepted");
    check("residency response");
    world
        .admin(
            &native_id,
            VerificationTrack::AmericanIndianStatus,
            OverrideAction::Reject,
        )
        .expect("native rejection accepted");
    world
        .admin(&citizen_id, VerificationTrack::Ssn, OverrideAction::Reject)
        .expect("ssn rejection accepted");
    check("rejections");
    world
        .admin(&citizen_id, VerificationTrack::Ssn, OverrideAction::Verify)
        .expect("ssn verification accepted");
    check("admin verification");
}
