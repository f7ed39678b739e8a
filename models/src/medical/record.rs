//! Timeline entries — one immutable clinical event per row, contributed by
//! whichever write path created it. Entries are append-only; the aggregator
//! only ever merges them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::medical::patient::{PatientKey, RiskLevel};
use crate::roles::Role;

/// The producer endpoint an entry came from. Dedupe is by
/// `(producer, id)` — ids are unique only within a producer's table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordProducer {
    UnifiedRecord,
    DiagnosisReport,
    Suggestion,
    Prescription,
}

impl RecordProducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordProducer::UnifiedRecord => "unified_record",
            RecordProducer::DiagnosisReport => "diagnosis_report",
            RecordProducer::Suggestion => "suggestion",
            RecordProducer::Prescription => "prescription",
        }
    }
}

/// One clinical event on a patient's timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub id: i64,
    pub producer: RecordProducer,
    pub patient: PatientKey,
    pub created_at: DateTime<Utc>,
    pub uploaded_by_role: Role,
    pub uploader_name: Option<String>,
    pub sugar_level: Option<String>,
    /// `"systolic/diastolic"` as entered, e.g. `"120/80"`.
    pub blood_pressure: Option<String>,
    pub diagnosis: Option<String>,
    pub suggestion: Option<String>,
    /// Free-text companion (diagnosis notes, prescription summary).
    pub detail: Option<String>,
    pub file_category: Option<String>,
    pub file_name: Option<String>,
    pub file_ref: Option<String>,
}

impl TimelineEntry {
    pub fn dedupe_key(&self) -> (RecordProducer, i64) {
        (self.producer, self.id)
    }

    /// Numeric sugar reading for trend charts. Unparseable values stay in
    /// the timeline but are excluded from the trend subsequence.
    pub fn sugar_numeric(&self) -> Option<f64> {
        let raw = self.sugar_level.as_deref()?.trim();
        let token: String = raw
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        if token.is_empty() {
            return None;
        }
        token.parse::<f64>().ok()
    }

    pub fn blood_pressure_split(&self) -> Option<(i32, i32)> {
        let raw = self.blood_pressure.as_deref()?.trim();
        let (sys, dia) = raw.split_once('/')?;
        Some((sys.trim().parse().ok()?, dia.trim().parse().ok()?))
    }

    pub fn has_attachment(&self) -> bool {
        self.file_ref.is_some()
    }
}

/// Write-side shape for the unified record and diagnosis-report endpoints.
/// Never persisted as-is; the visibility gate sanitizes it per role first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordDraft {
    pub patient: Option<PatientKey>,
    pub sugar_level: Option<String>,
    pub blood_pressure: Option<String>,
    pub diagnosis: Option<String>,
    pub suggestion: Option<String>,
    pub notes: Option<String>,
    pub file_category: Option<String>,
    pub file_name: Option<String>,
    #[serde(skip)]
    pub file_bytes: Option<Vec<u8>>,
}

impl RecordDraft {
    pub fn for_patient(key: PatientKey) -> Self {
        Self { patient: Some(key), ..Self::default() }
    }

    pub fn has_clinical_fields(&self) -> bool {
        self.diagnosis.is_some() || self.suggestion.is_some()
    }
}

/// Doctor suggestion write payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestionDraft {
    pub patient: PatientKey,
    pub notes: String,
    pub risk_level: Option<RiskLevel>,
    pub followup_date: Option<chrono::NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::{RecordProducer, TimelineEntry};
    use crate::medical::patient::{PatientKey, RecordSource};
    use crate::roles::Role;
    use chrono::Utc;

    fn entry(sugar: Option<&str>, bp: Option<&str>) -> TimelineEntry {
        TimelineEntry {
            id: 1,
            producer: RecordProducer::UnifiedRecord,
            patient: PatientKey { id: 1, source: RecordSource::Master },
            created_at: Utc::now(),
            uploaded_by_role: Role::Staff,
            uploader_name: None,
            sugar_level: sugar.map(str::to_string),
            blood_pressure: bp.map(str::to_string),
            diagnosis: None,
            suggestion: None,
            detail: None,
            file_category: None,
            file_name: None,
            file_ref: None,
        }
    }

    #[test]
    fn should_parse_numeric_sugar_readings() {
        assert_eq!(entry(Some("180"), None).sugar_numeric(), Some(180.0));
        assert_eq!(entry(Some("110.5 mg/dL"), None).sugar_numeric(), Some(110.5));
        assert_eq!(entry(Some("high"), None).sugar_numeric(), None);
        assert_eq!(entry(None, None).sugar_numeric(), None);
    }

    #[test]
    fn should_split_blood_pressure_strings() {
        assert_eq!(entry(None, Some("120/80")).blood_pressure_split(), Some((120, 80)));
        assert_eq!(entry(None, Some("118 / 76")).blood_pressure_split(), Some((118, 76)));
        assert_eq!(entry(None, Some("120-80")).blood_pressure_split(), None);
        assert_eq!(entry(None, None).blood_pressure_split(), None);
    }
}
