use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    CitizenStatus, Identity, LawfulPresenceResult, ResidencyStatus, TrackStatus,
    VerificationAuthority, VerificationTrack,
};

/// Reason recorded when a native consumer without an SSN is flagged for documentation.
pub const NO_SSN_FOR_NATIVE: &str = "no_ssn_for_native";

/// Citizenship/immigration determination for a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LawfulPresence {
    pub citizen_status: CitizenStatus,
    pub verification_result: LawfulPresenceResult,
    pub vlp_authority: Option<VerificationAuthority>,
    pub vlp_document_ref: Option<String>,
    pub determined_at: Option<DateTime<Utc>>,
}

impl LawfulPresence {
    fn pending(citizen_status: CitizenStatus, vlp_document_ref: Option<String>) -> Self {
        Self {
            citizen_status,
            verification_result: LawfulPresenceResult::Pending,
            vlp_authority: None,
            vlp_document_ref,
            determined_at: None,
        }
    }
}

/// Per-consumer record of the four verification tracks.
///
/// Fields are only writable through the crate-internal effect methods below; the state
/// machine is the only caller, and every write is followed by an integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationLedger {
    ssn_status: TrackStatus,
    ssn_update_reason: Option<String>,
    native_american_status: TrackStatus,
    native_update_reason: Option<String>,
    residency_status: ResidencyStatus,
    residency_update_reason: Option<String>,
    residency_determined_at: Option<DateTime<Utc>>,
    lawful_presence: LawfulPresence,
    lawful_presence_update_reason: Option<String>,
    ssn_rejected: bool,
    native_rejected: bool,
    lawful_presence_rejected: bool,
    residency_rejected: bool,
}

impl VerificationLedger {
    /// Pre-purchase defaults for a freshly registered consumer.
    pub fn for_identity(identity: &Identity, residency: ResidencyStatus) -> Self {
        Self {
            ssn_status: default_ssn_status(identity),
            ssn_update_reason: None,
            native_american_status: default_native_status(identity),
            native_update_reason: None,
            residency_status: residency,
            residency_update_reason: None,
            residency_determined_at: None,
            lawful_presence: LawfulPresence::pending(identity.citizen_status, None),
            lawful_presence_update_reason: None,
            ssn_rejected: false,
            native_rejected: false,
            lawful_presence_rejected: false,
            residency_rejected: false,
        }
    }

    pub fn ssn_status(&self) -> TrackStatus {
        self.ssn_status
    }

    pub fn ssn_update_reason(&self) -> Option<&str> {
        self.ssn_update_reason.as_deref()
    }

    pub fn native_american_status(&self) -> TrackStatus {
        self.native_american_status
    }

    pub fn native_update_reason(&self) -> Option<&str> {
        self.native_update_reason.as_deref()
    }

    pub fn residency_status(&self) -> ResidencyStatus {
        self.residency_status
    }

    pub fn residency_update_reason(&self) -> Option<&str> {
        self.residency_update_reason.as_deref()
    }

    pub fn residency_determined_at(&self) -> Option<DateTime<Utc>> {
        self.residency_determined_at
    }

    pub fn lawful_presence(&self) -> &LawfulPresence {
        &self.lawful_presence
    }

    pub fn lawful_presence_update_reason(&self) -> Option<&str> {
        self.lawful_presence_update_reason.as_deref()
    }

    pub fn is_rejected(&self, track: VerificationTrack) -> bool {
        match track {
            VerificationTrack::Ssn => self.ssn_rejected,
            VerificationTrack::LawfulPresence => self.lawful_presence_rejected,
            VerificationTrack::AmericanIndianStatus => self.native_rejected,
            VerificationTrack::Residency => self.residency_rejected,
        }
    }

    pub fn any_rejected(&self) -> bool {
        self.ssn_rejected
            || self.native_rejected
            || self.lawful_presence_rejected
            || self.residency_rejected
    }

    pub fn ssn_satisfied(&self) -> bool {
        self.ssn_status.is_satisfied() && !self.ssn_rejected
    }

    pub fn citizenship_satisfied(&self) -> bool {
        self.lawful_presence.verification_result == LawfulPresenceResult::Verified
            && !self.lawful_presence_rejected
    }

    pub fn native_satisfied(&self) -> bool {
        self.native_american_status.is_satisfied() && !self.native_rejected
    }

    pub fn residency_verified(&self) -> bool {
        self.residency_status.is_verified() && !self.residency_rejected
    }

    pub fn all_tracks_verified(&self) -> bool {
        self.ssn_satisfied()
            && self.citizenship_satisfied()
            && self.native_satisfied()
            && self.residency_verified()
            && !self.any_rejected()
    }

    /// Tracks currently blocking full verification, in display order.
    pub fn unresolved_tracks(&self) -> Vec<VerificationTrack> {
        let mut tracks = Vec::new();
        if !self.ssn_satisfied() {
            tracks.push(VerificationTrack::Ssn);
        }
        if !self.citizenship_satisfied() {
            tracks.push(VerificationTrack::LawfulPresence);
        }
        if !self.native_satisfied() {
            tracks.push(VerificationTrack::AmericanIndianStatus);
        }
        if !self.residency_verified() {
            tracks.push(VerificationTrack::Residency);
        }
        tracks
    }

    pub(crate) fn set_ssn_status(&mut self, status: TrackStatus, reason: &str) {
        if self.ssn_status != status {
            self.ssn_status = status;
            self.ssn_update_reason = Some(reason.to_string());
        }
    }

    pub(crate) fn set_native_status(&mut self, status: TrackStatus, reason: &str) {
        if self.native_american_status != status {
            self.native_american_status = status;
            self.native_update_reason = Some(reason.to_string());
        }
    }

    pub(crate) fn set_residency_status(
        &mut self,
        status: ResidencyStatus,
        reason: &str,
        at: DateTime<Utc>,
    ) {
        if self.residency_status != status {
            self.residency_status = status;
            self.residency_update_reason = Some(reason.to_string());
            self.residency_determined_at = Some(at);
        }
    }

    pub(crate) fn set_lawful_presence(
        &mut self,
        result: LawfulPresenceResult,
        authority: Option<VerificationAuthority>,
        reason: &str,
        at: DateTime<Utc>,
    ) {
        let current = &self.lawful_presence;
        if current.verification_result == result && current.vlp_authority == authority {
            return;
        }
        self.lawful_presence.verification_result = result;
        self.lawful_presence.vlp_authority = authority;
        self.lawful_presence.determined_at = Some(at);
        self.lawful_presence_update_reason = Some(reason.to_string());
    }

    pub(crate) fn set_rejected(&mut self, track: VerificationTrack, rejected: bool) {
        match track {
            VerificationTrack::Ssn => self.ssn_rejected = rejected,
            VerificationTrack::LawfulPresence => self.lawful_presence_rejected = rejected,
            VerificationTrack::AmericanIndianStatus => self.native_rejected = rejected,
            VerificationTrack::Residency => self.residency_rejected = rejected,
        }
    }

    /// Restore SSN, American Indian and lawful presence tracks to their pre-purchase
    /// defaults. Residency and the VLP document reference survive.
    pub(crate) fn reset_to_defaults(&mut self, identity: &Identity, reason: &str) {
        self.set_ssn_status(default_ssn_status(identity), reason);
        self.set_native_status(default_native_status(identity), reason);

        let document_ref = self.lawful_presence.vlp_document_ref.take();
        let reset = LawfulPresence::pending(identity.citizen_status, document_ref);
        if self.lawful_presence != reset {
            self.lawful_presence = reset;
            self.lawful_presence_update_reason = Some(reason.to_string());
        }

        self.ssn_rejected = false;
        self.native_rejected = false;
        self.lawful_presence_rejected = false;
    }

    /// Re-derive identity-dependent fields after the identity snapshot was replaced.
    pub(crate) fn refresh_derived(&mut self, identity: &Identity, reason: &str) {
        let native_no_ssn_flag = identity.is_native()
            && self.ssn_status == TrackStatus::Outstanding
            && self.ssn_update_reason.as_deref() == Some(NO_SSN_FOR_NATIVE);

        if !identity.has_ssn() && !native_no_ssn_flag {
            self.set_ssn_status(TrackStatus::Na, reason);
        } else if identity.has_ssn() && self.ssn_status == TrackStatus::Na {
            self.set_ssn_status(TrackStatus::Pending, reason);
        }

        if !identity.has_tribal_id() {
            self.set_native_status(TrackStatus::Na, reason);
            self.native_rejected = false;
        } else if self.native_american_status == TrackStatus::Na {
            self.set_native_status(TrackStatus::Pending, reason);
        }

        self.lawful_presence.citizen_status = identity.citizen_status;
    }

    pub(crate) fn set_vlp_document_ref(&mut self, document_ref: Option<String>) {
        self.lawful_presence.vlp_document_ref = document_ref;
    }
}

fn default_ssn_status(identity: &Identity) -> TrackStatus {
    if identity.has_ssn() {
        TrackStatus::Pending
    } else {
        TrackStatus::Na
    }
}

fn default_native_status(identity: &Identity) -> TrackStatus {
    if identity.has_tribal_id() {
        TrackStatus::Pending
    } else {
        TrackStatus::Na
    }
}
