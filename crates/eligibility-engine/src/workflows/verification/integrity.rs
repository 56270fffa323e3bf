use super::domain::{Identity, TrackStatus};
use super::ledger::{VerificationLedger, NO_SSN_FOR_NATIVE};

/// Derived-field invariant violated by a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ledger field '{field}' is inconsistent with the identity on file")]
pub struct LedgerViolation {
    pub field: &'static str,
}

/// Check the identity-derived ledger fields.
///
/// An SSN on file means `ssn_status` is never `na`; no SSN means `na`, except for a native
/// consumer flagged `outstanding` with reason `no_ssn_for_native`. A tribal ID on file is
/// equivalent to `native_american_status != na`.
pub fn check_ledger(identity: &Identity, ledger: &VerificationLedger) -> Result<(), LedgerViolation> {
    let ssn_status = ledger.ssn_status();
    let ssn_consistent = if identity.has_ssn() {
        ssn_status != TrackStatus::Na
    } else {
        ssn_status == TrackStatus::Na
            || (identity.is_native()
                && ssn_status == TrackStatus::Outstanding
                && ledger.ssn_update_reason() == Some(NO_SSN_FOR_NATIVE))
    };
    if !ssn_consistent {
        return Err(LedgerViolation {
            field: "ssn_status",
        });
    }

    if identity.has_tribal_id() == (ledger.native_american_status() == TrackStatus::Na) {
        return Err(LedgerViolation {
            field: "native_american_status",
        });
    }

    if ledger.lawful_presence().citizen_status != identity.citizen_status {
        return Err(LedgerViolation {
            field: "lawful_presence.citizen_status",
        });
    }

    Ok(())
}
