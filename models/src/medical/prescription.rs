use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::medical::patient::{PatientKey, RecordSource};
use crate::medical::record::{RecordProducer, TimelineEntry};
use crate::roles::Role;

/// An issued prescription. Append-only and immutable once issued; the
/// prescription module only exists for master-sourced patients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_name: Option<String>,
    pub medicine_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    /// One-line summary the timeline renders, e.g.
    /// `"Metformin 500mg - twice daily for 30 days"`.
    pub fn summary(&self) -> String {
        format!(
            "{} {} - {} for {}",
            self.medicine_name, self.dosage, self.frequency, self.duration
        )
    }

    /// Projects the prescription into the merged timeline as an event.
    pub fn to_timeline_entry(&self) -> TimelineEntry {
        TimelineEntry {
            id: self.id,
            producer: RecordProducer::Prescription,
            patient: PatientKey { id: self.patient_id, source: RecordSource::Master },
            created_at: self.created_at,
            uploaded_by_role: Role::Doctor,
            uploader_name: self.doctor_name.clone(),
            sugar_level: None,
            blood_pressure: None,
            diagnosis: None,
            suggestion: None,
            detail: Some(self.summary()),
            file_category: None,
            file_name: None,
            file_ref: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Prescription;
    use crate::medical::patient::RecordSource;
    use crate::medical::record::RecordProducer;
    use crate::roles::Role;
    use chrono::Utc;

    #[test]
    fn should_project_prescription_as_doctor_authored_event() {
        let rx = Prescription {
            id: 12,
            patient_id: 3,
            doctor_name: Some("Dr. Rao".to_string()),
            medicine_name: "Metformin".to_string(),
            dosage: "500mg".to_string(),
            frequency: "twice daily".to_string(),
            duration: "30 days".to_string(),
            created_at: Utc::now(),
        };
        let entry = rx.to_timeline_entry();
        assert_eq!(entry.producer, RecordProducer::Prescription);
        assert_eq!(entry.uploaded_by_role, Role::Doctor);
        assert_eq!(entry.patient.source, RecordSource::Master);
        assert_eq!(entry.detail.as_deref(), Some("Metformin 500mg - twice daily for 30 days"));
        assert!(entry.diagnosis.is_none());
    }
}
