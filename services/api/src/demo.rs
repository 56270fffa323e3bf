use crate::infra::{default_eligibility_config, parse_date};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use eligibility_engine::clock::{ClockSource, FixedClock};
use eligibility_engine::config::WorkflowConfig;
use eligibility_engine::error::AppError;
use eligibility_engine::workflows::audit::EntityKind;
use eligibility_engine::workflows::enrollment::{EnrollmentId, EnrollmentKind};
use eligibility_engine::workflows::orchestrator::{
    AdminVerificationOverride, ConsumerRegistration, CoveragePurchased, EnrollmentAction,
    EnrollmentActionKind, EnrollmentActionParams, EnrollmentRequest, MemoryWorkflowRepository,
    OverrideAction, VerificationResponse, VerificationResponseReceived, WorkflowOrchestrator,
    WorkflowOutcome,
};
use eligibility_engine::workflows::verification::{
    CitizenStatus, ConsumerId, Identity, ResidencyOutcome, ResidencyStatus, VerificationTrack,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Simulated start date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Print the audit trail of every demo consumer at the end.
    #[arg(long)]
    pub(crate) show_audit: bool,
}

type DemoOrchestrator = WorkflowOrchestrator<MemoryWorkflowRepository>;

struct Demo {
    orchestrator: DemoOrchestrator,
    clock: Arc<FixedClock>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start = args.start.unwrap_or_else(|| Local::now().date_naive());
    let clock = Arc::new(FixedClock::on(start));
    let config = WorkflowConfig::default();
    let demo = Demo {
        orchestrator: WorkflowOrchestrator::new(
            Arc::new(MemoryWorkflowRepository::new()),
            clock.clone(),
            config,
            default_eligibility_config(),
        ),
        clock,
    };

    println!("Eligibility workflow demo (simulated start {start})");

    println!("\nCitizen with SSN, residency not yet determined");
    let maria = demo.register(
        Identity {
            first_name: "Maria".to_string(),
            last_name: "Delgado".to_string(),
            dob: birth_date("1985-02-11")?,
            ssn: Some("123456789".to_string()),
            citizen_status: CitizenStatus::UsCitizen,
            tribal_id: None,
        },
        ResidencyStatus::Unset,
    )?;
    let coverage = demo.open(&maria, start + Duration::days(17))?;
    demo.act(&coverage, EnrollmentActionKind::Select)?;
    demo.purchase(&maria, false)?;
    demo.respond(
        &maria,
        VerificationResponse::Ssa {
            ssn_valid: true,
            citizenship_valid: Some(false),
        },
    )?;
    demo.respond(
        &maria,
        VerificationResponse::Dhs {
            authorized: true,
            document_ref: Some("I-551".to_string()),
        },
    )?;
    demo.respond(
        &maria,
        VerificationResponse::Residency {
            outcome: ResidencyOutcome::Authorized,
        },
    )?;

    println!("\nTribe member without SSN");
    let joseph = demo.register(
        Identity {
            first_name: "Joseph".to_string(),
            last_name: "Tsosie".to_string(),
            dob: birth_date("1990-08-30")?,
            ssn: None,
            citizen_status: CitizenStatus::IndianTribeMember,
            tribal_id: Some("NAV-4471".to_string()),
        },
        ResidencyStatus::Attested,
    )?;
    demo.purchase(&joseph, true)?;

    println!("\nAdministrator rejects Maria's SSN, then restores it");
    demo.admin(&maria, OverrideAction::Reject, "card number mismatch")?;
    demo.admin(&maria, OverrideAction::Verify, "replacement card reviewed")?;

    let period = i64::from(config.verification_period_days);
    demo.clock.advance(Duration::days(period));
    println!(
        "\nVerification period sweep on {} ({period} days later)",
        demo.clock.today()
    );
    let expired = demo.orchestrator.expire_verification_periods(100)?;
    if expired.is_empty() {
        println!("- no verification periods ended");
    }
    for outcome in &expired {
        print_outcome("verification period expired", outcome);
    }

    let status = demo.orchestrator.consumer_status(&joseph)?;
    println!(
        "- {} is {} with unresolved tracks: {}",
        status.consumer_id.0,
        status.state,
        status
            .unresolved_tracks
            .iter()
            .map(|track| track.label())
            .collect::<Vec<_>>()
            .join(", ")
    );

    if args.show_audit {
        for consumer_id in [&maria, &joseph] {
            println!("\nAudit trail for {}", consumer_id.0);
            for entry in demo
                .orchestrator
                .audit_trail(EntityKind::Consumer, &consumer_id.0)?
            {
                println!(
                    "  #{:<3} {:<26} -> {:<26} via {} by {}",
                    entry.sequence_no,
                    entry.from_state.as_deref().unwrap_or("(created)"),
                    entry.to_state,
                    entry.triggering_event,
                    entry.actor_id
                );
            }
        }
    }

    Ok(())
}

impl Demo {
    fn register(
        &self,
        identity: Identity,
        residency: ResidencyStatus,
    ) -> Result<ConsumerId, AppError> {
        let outcome = self.orchestrator.register_consumer(ConsumerRegistration {
            identity,
            residency,
        })?;
        print_outcome("registered", &outcome);
        outcome
            .consumer
            .map(|record| record.consumer_id)
            .ok_or_else(|| AppError::Io(std::io::Error::other("registration returned no consumer")))
    }

    fn open(
        &self,
        consumer_id: &ConsumerId,
        effective_on: NaiveDate,
    ) -> Result<EnrollmentId, AppError> {
        let outcome = self.orchestrator.open_enrollment(EnrollmentRequest {
            consumer_id: consumer_id.clone(),
            kind: EnrollmentKind::Individual,
            effective_on,
            enrollment_windows: Vec::new(),
        })?;
        print_outcome("enrollment opened", &outcome);
        outcome
            .enrollments
            .first()
            .map(|record| record.enrollment.id().clone())
            .ok_or_else(|| AppError::Io(std::io::Error::other("open returned no enrollment")))
    }

    fn act(
        &self,
        enrollment_id: &EnrollmentId,
        action: EnrollmentActionKind,
    ) -> Result<(), AppError> {
        let outcome = self.orchestrator.handle_enrollment_action(EnrollmentAction {
            enrollment_id: enrollment_id.clone(),
            action,
            params: EnrollmentActionParams::default(),
            actor_id: "broker-17".to_string(),
            admin: false,
            expected_version: None,
        })?;
        print_outcome(action.label(), &outcome);
        Ok(())
    }

    fn purchase(&self, consumer_id: &ConsumerId, residency_known: bool) -> Result<(), AppError> {
        let outcome = self.orchestrator.purchase_coverage(CoveragePurchased {
            consumer_id: consumer_id.clone(),
            residency_known,
            expected_version: None,
        })?;
        print_outcome("coverage purchased", &outcome);
        Ok(())
    }

    fn respond(
        &self,
        consumer_id: &ConsumerId,
        response: VerificationResponse,
    ) -> Result<(), AppError> {
        self.clock.advance(Duration::hours(6));
        let authority = response.authority().label();
        let outcome = self
            .orchestrator
            .handle_verification_response(VerificationResponseReceived {
                consumer_id: consumer_id.clone(),
                authority: format!("{authority}-gateway"),
                response,
                received_at: self.clock.now(),
                expected_version: None,
            })?;
        print_outcome(&format!("{authority} responded"), &outcome);
        Ok(())
    }

    fn admin(
        &self,
        consumer_id: &ConsumerId,
        action: OverrideAction,
        reason: &str,
    ) -> Result<(), AppError> {
        let outcome = self
            .orchestrator
            .handle_admin_override(AdminVerificationOverride {
                consumer_id: consumer_id.clone(),
                track: VerificationTrack::Ssn,
                action,
                reason: reason.to_string(),
                actor_id: "admin-7".to_string(),
                expected_version: None,
            })?;
        print_outcome(&format!("admin {action:?}").to_lowercase(), &outcome);
        Ok(())
    }
}

fn birth_date(raw: &str) -> Result<NaiveDate, AppError> {
    parse_date(raw).map_err(|message| AppError::Io(std::io::Error::other(message)))
}

fn print_outcome(step: &str, outcome: &WorkflowOutcome) {
    match &outcome.consumer {
        Some(record) => println!(
            "- {step}: {} is {} (v{})",
            record.consumer_id.0,
            record.verification.state().label(),
            record.version
        ),
        None => println!("- {step}"),
    }
    for record in &outcome.enrollments {
        println!(
            "    enrollment {} is {}{}",
            record.enrollment.id().0,
            record.enrollment.state().label(),
            if record.enrollment.is_outstanding() {
                " (verification outstanding)"
            } else {
                ""
            }
        );
    }
    for event in &outcome.events {
        println!("    event {}", event.name());
    }
}
