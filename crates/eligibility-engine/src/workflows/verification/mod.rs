//! Consumer identity, citizenship and residency verification.

pub mod domain;
pub mod integrity;
pub mod ledger;
pub mod machine;

#[cfg(test)]
mod tests;

pub use domain::{
    CitizenStatus, ConsumerId, ConsumerVerificationState, Identity, IdentityError,
    LawfulPresenceResult, ResidencyOutcome, ResidencyStatus, SensitiveField, TrackStatus,
    UnknownTrack, VerificationAuthority, VerificationTrack,
};
pub use integrity::{check_ledger, LedgerViolation};
pub use ledger::{LawfulPresence, VerificationLedger, NO_SSN_FOR_NATIVE};
pub use machine::{
    ConsumerVerification, ConsumerVerificationStateMachine, VerificationError,
    VerificationEvent, VerificationIntent, VerificationTransition,
};
