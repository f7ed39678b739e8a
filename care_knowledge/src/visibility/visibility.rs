//! Visibility policy — one chokepoint deciding which timeline fields a
//! role may read and which draft fields it may write. Every role is
//! matched exhaustively; adding a role will not compile until its
//! visibility is decided here.

use log::warn;

use models::{
    PatientRef, PortalResult, RecordDraft, Role, Session, TimelineEntry, ValidationError,
};

/// How the clinical fields (diagnosis, suggestion) of an entry render for
/// the current viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClinicalFieldAccess {
    /// Doctors see and may author them.
    Editable,
    /// Visible but never writable (staff, and patients on their own
    /// records).
    ReadOnly,
}

/// One timeline entry after the policy pass.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleEntry {
    pub entry: TimelineEntry,
    /// `None` means the clinical fields were withheld entirely.
    pub clinical_access: Option<ClinicalFieldAccess>,
}

impl VisibleEntry {
    pub fn diagnosis(&self) -> Option<&str> {
        self.clinical_access.and(self.entry.diagnosis.as_deref())
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.clinical_access.and(self.entry.suggestion.as_deref())
    }
}

/// Applies the read policy to a merged timeline.
///
/// Vitals, attachments and uploader provenance are visible to every role
/// that can see the entry at all. Staff read doctor-authored clinical
/// fields but can never edit them; the authorship gate is the write side
/// (`sanitize_draft`), not the read side. Patient sessions see only
/// entries of their own record.
pub fn filter_timeline(session: &Session, entries: Vec<TimelineEntry>) -> Vec<VisibleEntry> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let clinical_access = match session.role {
                Role::Admin | Role::Doctor => Some(ClinicalFieldAccess::Editable),
                Role::Staff => Some(ClinicalFieldAccess::ReadOnly),
                Role::Patient => {
                    if !session.owns(&entry.patient) {
                        return None;
                    }
                    Some(ClinicalFieldAccess::ReadOnly)
                }
            };
            Some(VisibleEntry { entry, clinical_access })
        })
        .collect()
}

/// Applies the write policy to a draft before it reaches the backend.
///
/// Staff drafts lose their clinical fields silently, mirroring the
/// server-side strip, so a compromised form cannot smuggle a diagnosis
/// through. Patient drafts are rejected outright.
pub fn sanitize_draft(session: &Session, mut draft: RecordDraft) -> PortalResult<RecordDraft> {
    match session.role {
        Role::Admin | Role::Doctor => Ok(draft),
        Role::Staff => {
            if draft.has_clinical_fields() {
                warn!(
                    "[VISIBILITY] stripped clinical fields from staff draft by {}",
                    session.display_name
                );
                draft.diagnosis = None;
                draft.suggestion = None;
            }
            Ok(draft)
        }
        Role::Patient => Err(ValidationError::RoleCannotWrite(session.role.to_string()).into()),
    }
}

/// Whether the emergency banner shows for this viewer and patient. Only
/// clinical-side viewers of a high-risk master record ever see it.
pub fn emergency_banner(session: &Session, patient: &PatientRef) -> bool {
    match session.role {
        Role::Admin | Role::Doctor | Role::Staff => patient.is_high_risk(),
        Role::Patient => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{emergency_banner, filter_timeline, sanitize_draft, ClinicalFieldAccess};
    use chrono::Utc;
    use models::{
        PatientKey, PatientRef, PortalError, RecordDraft, RecordProducer, RecordSource, RiskLevel,
        Role, Session, TimelineEntry, ValidationError,
    };

    fn entry(patient: PatientKey) -> TimelineEntry {
        TimelineEntry {
            id: 1,
            producer: RecordProducer::DiagnosisReport,
            patient,
            created_at: Utc::now(),
            uploaded_by_role: Role::Doctor,
            uploader_name: Some("Dr. Rao".to_string()),
            sugar_level: Some("180".to_string()),
            blood_pressure: None,
            diagnosis: Some("Type 2 Diabetes".to_string()),
            suggestion: None,
            detail: None,
            file_category: None,
            file_name: None,
            file_ref: None,
        }
    }

    fn key(id: i64) -> PatientKey {
        PatientKey { id, source: RecordSource::Registered }
    }

    #[test]
    fn should_show_staff_doctor_diagnoses_read_only() {
        let staff = Session::new("tok", Role::Staff, 9, "Nina");
        let visible = filter_timeline(&staff, vec![entry(key(1))]);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].clinical_access, Some(ClinicalFieldAccess::ReadOnly));
        assert_eq!(visible[0].diagnosis(), Some("Type 2 Diabetes"));
        assert_eq!(visible[0].entry.sugar_level.as_deref(), Some("180"));
    }

    #[test]
    fn should_show_patients_their_own_records_read_only() {
        let patient = Session::for_patient("tok", key(1), "Asha");
        let visible = filter_timeline(&patient, vec![entry(key(1)), entry(key(2))]);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].clinical_access, Some(ClinicalFieldAccess::ReadOnly));
        assert_eq!(visible[0].diagnosis(), Some("Type 2 Diabetes"));
    }

    #[test]
    fn should_give_doctors_editable_clinical_fields() {
        let doctor = Session::new("tok", Role::Doctor, 1, "Dr. Rao");
        let visible = filter_timeline(&doctor, vec![entry(key(1))]);
        assert_eq!(visible[0].clinical_access, Some(ClinicalFieldAccess::Editable));
    }

    #[test]
    fn should_strip_staff_drafts_silently() {
        let staff = Session::new("tok", Role::Staff, 9, "Nina");
        let mut draft = RecordDraft::for_patient(key(1));
        draft.sugar_level = Some("140".to_string());
        draft.diagnosis = Some("smuggled".to_string());

        let sanitized = sanitize_draft(&staff, draft).unwrap();
        assert!(sanitized.diagnosis.is_none());
        assert_eq!(sanitized.sugar_level.as_deref(), Some("140"));
    }

    #[test]
    fn should_reject_patient_writes() {
        let patient = Session::for_patient("tok", key(1), "Asha");
        let result = sanitize_draft(&patient, RecordDraft::for_patient(key(1)));
        assert!(matches!(
            result,
            Err(PortalError::Validation(ValidationError::RoleCannotWrite(_)))
        ));
    }

    #[test]
    fn should_show_emergency_banner_only_to_clinical_viewers() {
        let high_risk = PatientRef {
            id: 3,
            source: RecordSource::Master,
            abha_id: "123456789000".to_string(),
            aadhaar_id: None,
            name: "Demo Patient".to_string(),
            blood_group: None,
            allergies: None,
            medical_notes: None,
            emergency_contact: None,
            phone: None,
            risk_level: Some(RiskLevel::High),
            chronic_conditions: None,
            current_medicines: None,
        };
        let doctor = Session::new("tok", Role::Doctor, 1, "Dr. Rao");
        let own = Session::for_patient("tok", high_risk.key(), "Demo Patient");
        assert!(emergency_banner(&doctor, &high_risk));
        assert!(!emergency_banner(&own, &high_risk));
    }
}
