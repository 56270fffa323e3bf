use chrono::NaiveDate;

use crate::clock::FixedClock;
use crate::config::WorkflowConfig;
use crate::workflows::verification::{
    CitizenStatus, ConsumerVerification, ConsumerVerificationStateMachine, Identity,
    ResidencyStatus,
};

pub(super) fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date")
}

pub(super) fn clock() -> FixedClock {
    FixedClock::on(start_date())
}

pub(super) fn machine() -> ConsumerVerificationStateMachine {
    ConsumerVerificationStateMachine::new(&WorkflowConfig::default())
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

pub(super) fn native_with_ssn() -> Identity {
    Identity {
        ssn: Some("555443333".to_string()),
        ..native_without_ssn()
    }
}

pub(super) fn immigrant_without_ssn() -> Identity {
    Identity {
        first_name: "Amara".to_string(),
        last_name: "Okafor".to_string(),
        dob: NaiveDate::from_ymd_opt(1994, 12, 3).expect("valid dob"),
        ssn: None,
        citizen_status: CitizenStatus::AlienLawfullyPresent,
        tribal_id: None,
    }
}

pub(super) fn consumer(identity: Identity, residency: ResidencyStatus) -> ConsumerVerification {
    ConsumerVerification::register(identity, residency)
}
