//! In-memory stand-in for the REST backend, used by service tests and the
//! end-to-end scenario. Mirrors the server-side rules the core depends on
//! (role strip on upload, clamped stock decrement, duplicate registration
//! checks) and supports per-producer fault injection plus token revocation
//! so degraded-fetch and session-teardown paths can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use models::{
    MedicationReminder, PatientKey, PatientRef, PortalError, PortalResult, Prescription,
    RecordDraft, RecordProducer, RecordSource, ReminderDraft, Role, Session, SuggestionDraft,
    TimelineEntry, TodayStatus, ValidationError,
};

use crate::backend::PortalBackend;

#[derive(Default)]
pub struct MockPortal {
    master: RwLock<Vec<PatientRef>>,
    registered: RwLock<Vec<PatientRef>>,
    unified: RwLock<Vec<TimelineEntry>>,
    diagnosis_reports: RwLock<Vec<TimelineEntry>>,
    suggestions: RwLock<Vec<TimelineEntry>>,
    prescriptions: RwLock<Vec<Prescription>>,
    reminders: RwLock<Vec<MedicationReminder>>,
    files: RwLock<HashMap<i64, Vec<u8>>>,
    dose_logged_today: RwLock<HashSet<i64>>,
    producer_calls: RwLock<HashMap<RecordProducer, u32>>,
    failing_producers: RwLock<HashSet<RecordProducer>>,
    revoked_tokens: RwLock<HashSet<String>>,
    fail_patient_lookups: AtomicBool,
    next_id: AtomicI64,
}

impl MockPortal {
    pub fn new() -> Self {
        Self { next_id: AtomicI64::new(1), ..Self::default() }
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    // ── Seeding & fault injection ─────────────────────────

    /// Seeds a hospital-managed patient, assigning its master-store id.
    pub async fn seed_master_patient(&self, mut patient: PatientRef) -> PatientKey {
        patient.id = self.alloc_id();
        patient.source = RecordSource::Master;
        let key = patient.key();
        self.master.write().await.push(patient);
        key
    }

    /// Portal self-registration. One registered record per ABHA and per
    /// Aadhaar; duplicates are rejected the way the backend rejects them.
    pub async fn register_patient(&self, mut patient: PatientRef) -> PortalResult<PatientKey> {
        let registered = self.registered.read().await;
        for existing in registered.iter() {
            if existing.abha_id == patient.abha_id {
                return Err(ValidationError::DuplicateIdentifier(patient.abha_id).into());
            }
            if patient.aadhaar_id.is_some() && existing.aadhaar_id == patient.aadhaar_id {
                let dup = patient.aadhaar_id.clone().unwrap_or_default();
                return Err(ValidationError::DuplicateIdentifier(dup).into());
            }
        }
        drop(registered);
        patient.id = self.alloc_id();
        patient.source = RecordSource::Registered;
        // Registered records never carry the master-only clinical extension
        patient.risk_level = None;
        patient.chronic_conditions = None;
        patient.current_medicines = None;
        let key = patient.key();
        self.registered.write().await.push(patient);
        Ok(key)
    }

    pub async fn seed_reminder(&self, draft: ReminderDraft) -> i64 {
        let id = self.alloc_id();
        self.reminders.write().await.push(MedicationReminder {
            id,
            patient: draft.patient,
            rx_id: draft.rx_id,
            medicine_name: draft.medicine_name,
            reminder_time: draft.reminder_time,
            total_stock: draft.total_stock,
            remaining_stock: draft.total_stock,
            taken_count: 0,
            missed_count: 0,
            today_status: TodayStatus::Pending,
            is_active: true,
        });
        id
    }

    /// Makes one producer endpoint fail with a transport error.
    pub async fn fail_producer(&self, producer: RecordProducer) {
        self.failing_producers.write().await.insert(producer);
    }

    pub async fn restore_producer(&self, producer: RecordProducer) {
        self.failing_producers.write().await.remove(&producer);
    }

    /// Makes both patient-store lookups fail with a transport error.
    pub fn fail_patient_lookups(&self, failing: bool) {
        self.fail_patient_lookups.store(failing, Ordering::SeqCst);
    }

    /// Simulates server-side token expiry: every later call with this token
    /// answers 401.
    pub async fn revoke_token(&self, token: &str) {
        self.revoked_tokens.write().await.insert(token.to_string());
    }

    /// How many fetches hit this producer endpoint, failures included.
    pub async fn producer_call_count(&self, producer: RecordProducer) -> u32 {
        self.producer_calls.read().await.get(&producer).copied().unwrap_or(0)
    }

    /// Resets today's dose log, as the backend's `CURRENT_DATE` filter does
    /// implicitly at midnight.
    pub async fn start_new_day(&self) {
        self.dose_logged_today.write().await.clear();
        for reminder in self.reminders.write().await.iter_mut() {
            reminder.today_status = TodayStatus::Pending;
        }
    }

    // ── Internal guards ───────────────────────────────────

    async fn authenticate(&self, session: &Session) -> PortalResult<()> {
        if self.revoked_tokens.read().await.contains(&session.token) {
            return Err(PortalError::Auth("token expired or revoked".to_string()));
        }
        Ok(())
    }

    async fn producer_available(&self, producer: RecordProducer) -> PortalResult<()> {
        *self.producer_calls.write().await.entry(producer).or_insert(0) += 1;
        if self.failing_producers.read().await.contains(&producer) {
            return Err(PortalError::Transport(format!(
                "{} endpoint unreachable",
                producer.as_str()
            )));
        }
        Ok(())
    }

    async fn find_in(
        &self,
        store: &RwLock<Vec<PatientRef>>,
        national_id: &str,
    ) -> PortalResult<Option<PatientRef>> {
        if self.fail_patient_lookups.load(Ordering::SeqCst) {
            return Err(PortalError::Transport("patient store unreachable".to_string()));
        }
        Ok(store
            .read()
            .await
            .iter()
            .find(|p| p.matches_identifier(national_id))
            .cloned())
    }
}

#[async_trait]
impl PortalBackend for MockPortal {
    async fn find_master_patient(
        &self,
        session: &Session,
        national_id: &str,
    ) -> PortalResult<Option<PatientRef>> {
        self.authenticate(session).await?;
        self.find_in(&self.master, national_id).await
    }

    async fn find_registered_patient(
        &self,
        session: &Session,
        national_id: &str,
    ) -> PortalResult<Option<PatientRef>> {
        self.authenticate(session).await?;
        self.find_in(&self.registered, national_id).await
    }

    async fn fetch_unified_records(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<TimelineEntry>> {
        self.authenticate(session).await?;
        self.producer_available(RecordProducer::UnifiedRecord).await?;
        let mut rows: Vec<TimelineEntry> = self
            .unified
            .read()
            .await
            .iter()
            .filter(|e| e.patient == *patient)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn fetch_diagnosis_reports(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<TimelineEntry>> {
        self.authenticate(session).await?;
        self.producer_available(RecordProducer::DiagnosisReport).await?;
        let mut rows: Vec<TimelineEntry> = self
            .diagnosis_reports
            .read()
            .await
            .iter()
            .filter(|e| e.patient == *patient)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn fetch_suggestions(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<TimelineEntry>> {
        self.authenticate(session).await?;
        self.producer_available(RecordProducer::Suggestion).await?;
        let mut rows: Vec<TimelineEntry> = self
            .suggestions
            .read()
            .await
            .iter()
            .filter(|e| e.patient == *patient)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn fetch_prescriptions(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<Prescription>> {
        self.authenticate(session).await?;
        self.producer_available(RecordProducer::Prescription).await?;
        let mut rows: Vec<Prescription> = self
            .prescriptions
            .read()
            .await
            .iter()
            .filter(|p| p.patient_id == patient.id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn upload_record(
        &self,
        session: &Session,
        mut draft: RecordDraft,
    ) -> PortalResult<TimelineEntry> {
        self.authenticate(session).await?;
        if session.role == Role::Patient {
            return Err(ValidationError::RoleCannotWrite(session.role.to_string()).into());
        }
        // Server-side RBAC strip, independent of the client-side gate
        if session.role == Role::Staff {
            draft.diagnosis = None;
            draft.suggestion = None;
        }
        let patient = draft
            .patient
            .ok_or_else(|| PortalError::Internal("draft missing patient key".to_string()))?;

        let id = self.alloc_id();
        let file_ref = draft.file_bytes.as_ref().map(|_| {
            let ext = draft
                .file_name
                .as_deref()
                .and_then(|n| n.rsplit_once('.'))
                .map(|(_, e)| format!(".{}", e))
                .unwrap_or_default();
            format!("medical/{}{}", Uuid::new_v4().simple(), ext)
        });
        if let Some(bytes) = draft.file_bytes.take() {
            self.files.write().await.insert(id, bytes);
        }

        let entry = TimelineEntry {
            id,
            producer: RecordProducer::UnifiedRecord,
            patient,
            created_at: Utc::now(),
            uploaded_by_role: session.role,
            uploader_name: Some(session.display_name.clone()),
            sugar_level: draft.sugar_level,
            blood_pressure: draft.blood_pressure,
            diagnosis: draft.diagnosis,
            suggestion: draft.suggestion,
            detail: draft.notes,
            file_category: draft.file_category,
            file_name: draft.file_name,
            file_ref,
        };
        self.unified.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn add_diagnosis(
        &self,
        session: &Session,
        draft: RecordDraft,
    ) -> PortalResult<TimelineEntry> {
        self.authenticate(session).await?;
        if !matches!(session.role, Role::Doctor | Role::Admin) {
            return Err(ValidationError::RoleCannotWrite(session.role.to_string()).into());
        }
        let diagnosis = match draft.diagnosis.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => return Err(ValidationError::EmptyDiagnosis.into()),
        };
        let patient = draft
            .patient
            .ok_or_else(|| PortalError::Internal("draft missing patient key".to_string()))?;

        let entry = TimelineEntry {
            id: self.alloc_id(),
            producer: RecordProducer::DiagnosisReport,
            patient,
            created_at: Utc::now(),
            uploaded_by_role: session.role,
            uploader_name: Some(session.display_name.clone()),
            sugar_level: draft.sugar_level,
            blood_pressure: draft.blood_pressure,
            diagnosis: Some(diagnosis),
            suggestion: None,
            detail: draft.notes,
            file_category: None,
            file_name: None,
            file_ref: None,
        };
        self.diagnosis_reports.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn add_suggestion(
        &self,
        session: &Session,
        draft: SuggestionDraft,
    ) -> PortalResult<TimelineEntry> {
        self.authenticate(session).await?;
        if !matches!(session.role, Role::Doctor | Role::Admin) {
            return Err(ValidationError::RoleCannotWrite(session.role.to_string()).into());
        }
        if draft.notes.trim().is_empty() {
            return Err(ValidationError::EmptyNotes.into());
        }
        let followup = draft
            .followup_date
            .map(|d| format!(" (follow-up {})", d))
            .unwrap_or_default();
        let entry = TimelineEntry {
            id: self.alloc_id(),
            producer: RecordProducer::Suggestion,
            patient: draft.patient,
            created_at: Utc::now(),
            uploaded_by_role: session.role,
            uploader_name: Some(session.display_name.clone()),
            sugar_level: None,
            blood_pressure: None,
            diagnosis: None,
            suggestion: Some(draft.notes),
            detail: if followup.is_empty() { None } else { Some(followup.trim().to_string()) },
            file_category: None,
            file_name: None,
            file_ref: None,
        };
        self.suggestions.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn add_prescription(
        &self,
        session: &Session,
        mut prescription: Prescription,
    ) -> PortalResult<Prescription> {
        self.authenticate(session).await?;
        if !matches!(session.role, Role::Doctor | Role::Admin) {
            return Err(ValidationError::RoleCannotWrite(session.role.to_string()).into());
        }
        prescription.id = self.alloc_id();
        prescription.created_at = Utc::now();
        self.prescriptions.write().await.push(prescription.clone());
        Ok(prescription)
    }

    async fn fetch_reminders(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<MedicationReminder>> {
        self.authenticate(session).await?;
        let mut rows: Vec<MedicationReminder> = self
            .reminders
            .read()
            .await
            .iter()
            .filter(|r| r.patient == *patient && r.is_active)
            .cloned()
            .collect();
        // reminder_time ASC NULLS LAST, as the backend orders them
        rows.sort_by_key(|r| (r.reminder_time.is_none(), r.reminder_time));
        Ok(rows)
    }

    async fn create_reminder(
        &self,
        session: &Session,
        draft: ReminderDraft,
    ) -> PortalResult<MedicationReminder> {
        self.authenticate(session).await?;
        let id = self.seed_reminder(draft).await;
        let reminders = self.reminders.read().await;
        let created = reminders
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| PortalError::Internal("reminder insert lost".to_string()))?;
        Ok(created)
    }

    async fn update_reminder_time(
        &self,
        session: &Session,
        reminder_id: i64,
        time: NaiveTime,
    ) -> PortalResult<()> {
        self.authenticate(session).await?;
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .iter_mut()
            .find(|r| r.id == reminder_id)
            .ok_or_else(|| PortalError::NotFound(format!("reminder {}", reminder_id)))?;
        reminder.reminder_time = Some(time);
        Ok(())
    }

    async fn mark_taken(&self, session: &Session, reminder_id: i64) -> PortalResult<u32> {
        self.authenticate(session).await?;
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .iter_mut()
            .find(|r| r.id == reminder_id)
            .ok_or_else(|| PortalError::NotFound(format!("reminder {}", reminder_id)))?;
        reminder.remaining_stock = reminder.remaining_stock.saturating_sub(1);
        reminder.taken_count += 1;
        reminder.today_status = TodayStatus::Taken;
        self.dose_logged_today.write().await.insert(reminder_id);
        Ok(reminder.remaining_stock)
    }

    async fn mark_missed(&self, session: &Session, reminder_id: i64) -> PortalResult<()> {
        self.authenticate(session).await?;
        if self.dose_logged_today.read().await.contains(&reminder_id) {
            return Ok(());
        }
        let mut reminders = self.reminders.write().await;
        let reminder = reminders
            .iter_mut()
            .find(|r| r.id == reminder_id)
            .ok_or_else(|| PortalError::NotFound(format!("reminder {}", reminder_id)))?;
        reminder.missed_count += 1;
        self.dose_logged_today.write().await.insert(reminder_id);
        Ok(())
    }

    async fn download_record(&self, session: &Session, record_id: i64) -> PortalResult<Vec<u8>> {
        self.authenticate(session).await?;
        self.files
            .read()
            .await
            .get(&record_id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound(format!("no file attached to record {}", record_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::MockPortal;
    use crate::backend::PortalBackend;
    use models::{
        PatientKey, PatientRef, PortalError, RecordDraft, RecordSource, Role, Session,
        ValidationError,
    };

    fn blank_patient(abha: &str, aadhaar: &str) -> PatientRef {
        PatientRef {
            id: 0,
            source: RecordSource::Registered,
            abha_id: abha.to_string(),
            aadhaar_id: Some(aadhaar.to_string()),
            name: "Asha Verma".to_string(),
            blood_group: None,
            allergies: None,
            medical_notes: None,
            emergency_contact: None,
            phone: None,
            risk_level: None,
            chronic_conditions: None,
            current_medicines: None,
        }
    }

    #[tokio::test]
    async fn should_reject_duplicate_registration_per_identifier() {
        let portal = MockPortal::new();
        portal.register_patient(blank_patient("111122223333", "444455556666")).await.unwrap();

        let same_abha = portal.register_patient(blank_patient("111122223333", "777788889999")).await;
        assert!(matches!(
            same_abha,
            Err(PortalError::Validation(ValidationError::DuplicateIdentifier(_)))
        ));

        let same_aadhaar = portal.register_patient(blank_patient("000011112222", "444455556666")).await;
        assert!(matches!(
            same_aadhaar,
            Err(PortalError::Validation(ValidationError::DuplicateIdentifier(_)))
        ));
    }

    #[tokio::test]
    async fn should_answer_401_after_token_revocation() {
        let portal = MockPortal::new();
        let session = Session::new("tok-1", Role::Doctor, 1, "Dr. Rao");
        portal.revoke_token("tok-1").await;
        let result = portal.find_master_patient(&session, "111122223333").await;
        assert!(matches!(result, Err(PortalError::Auth(_))));
    }

    #[tokio::test]
    async fn should_strip_clinical_fields_from_staff_uploads() {
        let portal = MockPortal::new();
        let key = PatientKey { id: 1, source: RecordSource::Master };
        let session = Session::new("tok-2", Role::Staff, 9, "Nina");
        let mut draft = RecordDraft::for_patient(key);
        draft.sugar_level = Some("140".to_string());
        draft.diagnosis = Some("smuggled".to_string());
        draft.suggestion = Some("smuggled".to_string());

        let entry = portal.upload_record(&session, draft).await.unwrap();
        assert!(entry.diagnosis.is_none());
        assert!(entry.suggestion.is_none());
        assert_eq!(entry.sugar_level.as_deref(), Some("140"));
    }

    #[tokio::test]
    async fn should_store_attachments_under_a_fresh_ref() {
        let portal = MockPortal::new();
        let key = PatientKey { id: 1, source: RecordSource::Master };
        let session = Session::new("tok-3", Role::Doctor, 1, "Dr. Rao");
        let mut draft = RecordDraft::for_patient(key);
        draft.file_name = Some("scan.pdf".to_string());
        draft.file_bytes = Some(vec![0x25, 0x50, 0x44, 0x46]);

        let entry = portal.upload_record(&session, draft).await.unwrap();
        let file_ref = entry.file_ref.as_deref().unwrap();
        assert!(file_ref.starts_with("medical/") && file_ref.ends_with(".pdf"));
        assert_ne!(file_ref, "medical/scan.pdf");

        let bytes = portal.download_record(&session, entry.id).await.unwrap();
        assert_eq!(bytes, vec![0x25, 0x50, 0x44, 0x46]);

        let missing = portal.download_record(&session, entry.id + 1).await;
        assert!(matches!(missing, Err(PortalError::NotFound(_))));
    }
}
