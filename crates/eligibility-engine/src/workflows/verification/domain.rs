use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsumerId(pub String);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immigration/citizenship attestation captured at application time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitizenStatus {
    UsCitizen,
    NaturalizedCitizen,
    AlienLawfullyPresent,
    LawfulPermanentResident,
    IndianTribeMember,
    UndocumentedImmigrant,
    NotLawfullyPresentInUs,
    NonNativeNotLawfullyPresentInUs,
    SsnPassCitizenshipFailsWithSsa,
    NonNativeCitizen,
}

impl CitizenStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::UsCitizen => "us_citizen",
            Self::NaturalizedCitizen => "naturalized_citizen",
            Self::AlienLawfullyPresent => "alien_lawfully_present",
            Self::LawfulPermanentResident => "lawful_permanent_resident",
            Self::IndianTribeMember => "indian_tribe_member",
            Self::UndocumentedImmigrant => "undocumented_immigrant",
            Self::NotLawfullyPresentInUs => "not_lawfully_present_in_us",
            Self::NonNativeNotLawfullyPresentInUs => "non_native_not_lawfully_present_in_us",
            Self::SsnPassCitizenshipFailsWithSsa => "ssn_pass_citizenship_fails_with_ssa",
            Self::NonNativeCitizen => "non_native_citizen",
        }
    }

    const ALL: [Self; 10] = [
        Self::UsCitizen,
        Self::NaturalizedCitizen,
        Self::AlienLawfullyPresent,
        Self::LawfulPermanentResident,
        Self::IndianTribeMember,
        Self::UndocumentedImmigrant,
        Self::NotLawfullyPresentInUs,
        Self::NonNativeNotLawfullyPresentInUs,
        Self::SsnPassCitizenshipFailsWithSsa,
        Self::NonNativeCitizen,
    ];
}

impl FromStr for CitizenStatus {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| IdentityError::InvalidValue {
                field: SensitiveField::CitizenStatus,
                value: value.to_string(),
            })
    }
}

/// Immutable identity snapshot for a consumer. Replaced wholesale when a sensitive field changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    #[serde(default)]
    pub ssn: Option<String>,
    pub citizen_status: CitizenStatus,
    #[serde(default)]
    pub tribal_id: Option<String>,
}

impl Identity {
    pub fn has_ssn(&self) -> bool {
        self.ssn.as_deref().is_some_and(|ssn| !ssn.trim().is_empty())
    }

    pub fn has_tribal_id(&self) -> bool {
        self.tribal_id
            .as_deref()
            .is_some_and(|tribal_id| !tribal_id.trim().is_empty())
    }

    pub fn is_native(&self) -> bool {
        self.citizen_status == CitizenStatus::IndianTribeMember
    }

    /// Current value of a sensitive field in the string form used by change events.
    pub fn field_value(&self, field: SensitiveField) -> Option<String> {
        match field {
            SensitiveField::FirstName => Some(self.first_name.clone()),
            SensitiveField::LastName => Some(self.last_name.clone()),
            SensitiveField::Dob => Some(self.dob.format("%Y-%m-%d").to_string()),
            SensitiveField::Ssn => self.ssn.clone().filter(|_| self.has_ssn()),
            SensitiveField::CitizenStatus => Some(self.citizen_status.label().to_string()),
            SensitiveField::TribalId => self.tribal_id.clone().filter(|_| self.has_tribal_id()),
        }
    }

    /// Produce a new snapshot with one field replaced.
    pub fn with_change(
        &self,
        field: SensitiveField,
        new_value: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        let mut next = self.clone();
        let trimmed = new_value.map(str::trim).filter(|value| !value.is_empty());

        match field {
            SensitiveField::FirstName => {
                next.first_name = required(field, trimmed)?.to_string();
            }
            SensitiveField::LastName => {
                next.last_name = required(field, trimmed)?.to_string();
            }
            SensitiveField::Dob => {
                let raw = required(field, trimmed)?;
                next.dob = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    IdentityError::InvalidValue {
                        field,
                        value: raw.to_string(),
                    }
                })?;
            }
            SensitiveField::Ssn => {
                if let Some(raw) = trimmed {
                    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
                    if digits.len() != 9 {
                        return Err(IdentityError::InvalidValue {
                            field,
                            value: raw.to_string(),
                        });
                    }
                    next.ssn = Some(digits);
                } else {
                    next.ssn = None;
                }
            }
            SensitiveField::CitizenStatus => {
                next.citizen_status = required(field, trimmed)?.parse()?;
            }
            SensitiveField::TribalId => {
                next.tribal_id = trimmed.map(str::to_string);
            }
        }

        Ok(next)
    }
}

fn required(field: SensitiveField, value: Option<&str>) -> Result<&str, IdentityError> {
    value.ok_or(IdentityError::MissingValue(field))
}

/// Identity attributes whose change forces verification to be re-determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveField {
    FirstName,
    LastName,
    Dob,
    Ssn,
    CitizenStatus,
    TribalId,
}

impl SensitiveField {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Dob => "dob",
            Self::Ssn => "ssn",
            Self::CitizenStatus => "citizen_status",
            Self::TribalId => "tribal_id",
        }
    }
}

/// Errors raised while building a new identity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("{} requires a value", .0.label())]
    MissingValue(SensitiveField),
    #[error("invalid value for {}: '{value}'", field.label())]
    InvalidValue { field: SensitiveField, value: String },
}

/// One of the four independently tracked verification dimensions.
///
/// Deserializes from either the snake_case name or the label shown to administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum VerificationTrack {
    Ssn,
    LawfulPresence,
    AmericanIndianStatus,
    Residency,
}

impl VerificationTrack {
    /// Label shown to administrators and used in rejection requests.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ssn => "Social Security Number",
            Self::LawfulPresence => "Citizenship",
            Self::AmericanIndianStatus => "American Indian Status",
            Self::Residency => "DC Residency",
        }
    }
}

impl fmt::Display for VerificationTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VerificationTrack {
    type Err = UnknownTrack;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "social security number" | "ssn" => Ok(Self::Ssn),
            "citizenship" | "immigration status" | "lawful_presence" | "lawful presence" => {
                Ok(Self::LawfulPresence)
            }
            "american indian status" | "american_indian_status" | "native" => {
                Ok(Self::AmericanIndianStatus)
            }
            "dc residency" | "residency" | "local residency" => Ok(Self::Residency),
            _ => Err(UnknownTrack(value.to_string())),
        }
    }
}

impl TryFrom<String> for VerificationTrack {
    type Error = UnknownTrack;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verification track '{0}'")]
pub struct UnknownTrack(pub String);

/// Sub-status shared by the SSN and American Indian tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Na,
    Valid,
    Outstanding,
    Pending,
}

impl TrackStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Na => "na",
            Self::Valid => "valid",
            Self::Outstanding => "outstanding",
            Self::Pending => "pending",
        }
    }

    /// `na` counts as satisfied: the track does not apply to this consumer.
    pub const fn is_satisfied(self) -> bool {
        matches!(self, Self::Valid | Self::Na)
    }
}

/// Local residency sub-status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyStatus {
    Attested,
    Valid,
    Outstanding,
    Pending,
    #[default]
    Unset,
}

impl ResidencyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Attested => "attested",
            Self::Valid => "valid",
            Self::Outstanding => "outstanding",
            Self::Pending => "pending",
            Self::Unset => "unset",
        }
    }

    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Outstanding)
    }

    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending | Self::Unset)
    }

    pub const fn is_verified(self) -> bool {
        matches!(self, Self::Valid | Self::Attested)
    }

    /// Whether a determination exists, i.e. no residency lookup needs to be requested.
    pub const fn is_known(self) -> bool {
        !self.is_pending()
    }
}

/// Outcome of a local residency lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyOutcome {
    Denied,
    Pending,
    Authorized,
}

impl ResidencyOutcome {
    pub const fn status(self) -> ResidencyStatus {
        match self {
            Self::Denied => ResidencyStatus::Outstanding,
            Self::Pending => ResidencyStatus::Pending,
            Self::Authorized => ResidencyStatus::Valid,
        }
    }
}

/// Result of the lawful presence (citizenship/immigration) determination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LawfulPresenceResult {
    #[default]
    Pending,
    Verified,
    Outstanding,
}

impl LawfulPresenceResult {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Outstanding => "outstanding",
        }
    }
}

/// External authority consulted for a verification track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationAuthority {
    Ssa,
    Dhs,
    LocalResidency,
}

impl VerificationAuthority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ssa => "ssa",
            Self::Dhs => "dhs",
            Self::LocalResidency => "local_residency",
        }
    }
}

/// Aggregate verification lifecycle state of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerVerificationState {
    #[default]
    Unverified,
    SsaPending,
    DhsPending,
    VerificationOutstanding,
    SciVerified,
    FullyVerified,
    VerificationPeriodEnded,
}

impl ConsumerVerificationState {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Unverified,
            Self::SsaPending,
            Self::DhsPending,
            Self::VerificationOutstanding,
            Self::SciVerified,
            Self::FullyVerified,
            Self::VerificationPeriodEnded,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::SsaPending => "ssa_pending",
            Self::DhsPending => "dhs_pending",
            Self::VerificationOutstanding => "verification_outstanding",
            Self::SciVerified => "sci_verified",
            Self::FullyVerified => "fully_verified",
            Self::VerificationPeriodEnded => "verification_period_ended",
        }
    }

    /// Resting states that wait on an external authority.
    pub const fn awaiting_authority(self) -> Option<VerificationAuthority> {
        match self {
            Self::SsaPending => Some(VerificationAuthority::Ssa),
            Self::DhsPending => Some(VerificationAuthority::Dhs),
            _ => None,
        }
    }
}

impl fmt::Display for ConsumerVerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
