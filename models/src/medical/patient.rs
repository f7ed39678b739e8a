//! Patient identity across the two disjoint record stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Which store owns a patient record. Immutable once resolved; record ids
/// are unique only within a source, so cross-source operations always carry
/// the compound [`PatientKey`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    /// Hospital-managed record, the clinical source of authority.
    Master,
    /// Self-created record from the patient portal.
    Registered,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::Master => f.write_str("master"),
            RecordSource::Registered => f.write_str("registered"),
        }
    }
}

impl FromStr for RecordSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, ValidationError> {
        match s {
            "master" => Ok(RecordSource::Master),
            "registered" => Ok(RecordSource::Registered),
            other => Err(ValidationError::UnknownRecordSource(other.to_string())),
        }
    }
}

/// Compound key for everything keyed by patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PatientKey {
    pub id: i64,
    pub source: RecordSource,
}

impl fmt::Display for PatientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.id)
    }
}

/// Risk scoring exists only for master records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A resolved patient identity with the profile fields both dashboards
/// render. Master-only clinical extensions stay `None` for registered
/// records and read as "not applicable", never as an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRef {
    pub id: i64,
    pub source: RecordSource,
    pub abha_id: String,
    pub aadhaar_id: Option<String>,
    pub name: String,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    pub emergency_contact: Option<String>,
    pub phone: Option<String>,
    // Master-schema extensions
    pub risk_level: Option<RiskLevel>,
    pub chronic_conditions: Option<String>,
    pub current_medicines: Option<String>,
}

impl PatientRef {
    pub fn key(&self) -> PatientKey {
        PatientKey { id: self.id, source: self.source }
    }

    /// Emergency-banner condition. Registered records carry no risk scoring
    /// and can never satisfy it.
    pub fn is_high_risk(&self) -> bool {
        self.source == RecordSource::Master && self.risk_level == Some(RiskLevel::High)
    }

    pub fn matches_identifier(&self, national_id: &str) -> bool {
        self.abha_id == national_id || self.aadhaar_id.as_deref() == Some(national_id)
    }
}

/// Normalizes a lookup identifier the way the search box does (separators
/// dropped), then enforces the 12-ASCII-digit rule before any lookup runs.
pub fn normalize_national_id(raw: &str) -> Result<String, ValidationError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if cleaned.len() != 12 || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::MalformedNationalId);
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::{normalize_national_id, PatientRef, RecordSource, RiskLevel};
    use crate::errors::ValidationError;

    fn registered_patient() -> PatientRef {
        PatientRef {
            id: 4,
            source: RecordSource::Registered,
            abha_id: "123456789012".to_string(),
            aadhaar_id: Some("999988887777".to_string()),
            name: "Asha Verma".to_string(),
            blood_group: Some("B+".to_string()),
            allergies: None,
            medical_notes: None,
            emergency_contact: None,
            phone: Some("9876543210".to_string()),
            risk_level: None,
            chronic_conditions: None,
            current_medicines: None,
        }
    }

    #[test]
    fn should_accept_exactly_twelve_digits() {
        assert_eq!(normalize_national_id("123456789012").unwrap(), "123456789012");
        assert_eq!(normalize_national_id("1234 5678 9012").unwrap(), "123456789012");
        assert_eq!(normalize_national_id("1234-5678-9012").unwrap(), "123456789012");
    }

    #[test]
    fn should_reject_malformed_identifiers() {
        for bad in ["12345678901", "1234567890123", "12345678901a", "", "abha"] {
            assert_eq!(
                normalize_national_id(bad).unwrap_err(),
                ValidationError::MalformedNationalId,
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn should_match_either_national_identifier() {
        let patient = registered_patient();
        assert!(patient.matches_identifier("123456789012"));
        assert!(patient.matches_identifier("999988887777"));
        assert!(!patient.matches_identifier("000000000000"));
    }

    #[test]
    fn should_never_flag_registered_patients_as_high_risk() {
        let mut patient = registered_patient();
        // risk_level is not part of the registered schema, but even a stray
        // value must not trigger the banner for a registered record
        patient.risk_level = Some(RiskLevel::High);
        assert!(!patient.is_high_risk());
    }
}
