//! The REST backend contract the portal core consumes.
//!
//! Every operation carries the caller's [`Session`] and attaches its bearer
//! token; implementations map HTTP status codes onto the error taxonomy
//! uniformly: 401 is always `PortalError::Auth` (the caller side tears the
//! session down globally), 404 on a point lookup becomes `Ok(None)` or
//! `PortalError::NotFound` as documented per method, and connection-level
//! failures become `PortalError::Transport`.

use async_trait::async_trait;
use chrono::NaiveTime;

use models::{
    MedicationReminder, PatientKey, PatientRef, PortalResult, Prescription, RecordDraft,
    ReminderDraft, Session, SuggestionDraft, TimelineEntry,
};

/// Backend operations, store-scoped so the resolution precedence between
/// the master and registered stores stays in the core, not the transport.
#[async_trait]
pub trait PortalBackend: Send + Sync {
    /// Looks up a hospital-managed patient by ABHA or Aadhaar number.
    /// `Ok(None)` when the master store has no match.
    async fn find_master_patient(
        &self,
        session: &Session,
        national_id: &str,
    ) -> PortalResult<Option<PatientRef>>;

    /// Looks up a self-registered portal patient by ABHA or Aadhaar number.
    /// `Ok(None)` when the registered store has no match.
    async fn find_registered_patient(
        &self,
        session: &Session,
        national_id: &str,
    ) -> PortalResult<Option<PatientRef>>;

    /// `GET /medical-records/patient-records/{source}/{id}` — the unified
    /// upload-record table, newest first.
    async fn fetch_unified_records(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<TimelineEntry>>;

    /// `GET /patient-records/diagnosis/{source}/{id}` — doctor diagnosis
    /// reports, newest first.
    async fn fetch_diagnosis_reports(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<TimelineEntry>>;

    /// `GET /suggestions/{id}` — doctor suggestions; master-sourced
    /// patients only.
    async fn fetch_suggestions(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<TimelineEntry>>;

    /// `GET /prescriptions/{id}` — issued prescriptions; master-sourced
    /// patients only.
    async fn fetch_prescriptions(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<Prescription>>;

    /// `POST /medical-records/upload-record` (multipart). The draft must
    /// already be sanitized for the caller's role.
    async fn upload_record(
        &self,
        session: &Session,
        draft: RecordDraft,
    ) -> PortalResult<TimelineEntry>;

    /// `POST /patient-records/diagnosis`.
    async fn add_diagnosis(
        &self,
        session: &Session,
        draft: RecordDraft,
    ) -> PortalResult<TimelineEntry>;

    /// `POST /suggestions/`.
    async fn add_suggestion(
        &self,
        session: &Session,
        draft: SuggestionDraft,
    ) -> PortalResult<TimelineEntry>;

    /// `POST /prescriptions/`.
    async fn add_prescription(
        &self,
        session: &Session,
        prescription: Prescription,
    ) -> PortalResult<Prescription>;

    /// `GET /meds/reminders/{source}/{id}` — active reminders with
    /// taken/missed counters and today's log status.
    async fn fetch_reminders(
        &self,
        session: &Session,
        patient: &PatientKey,
    ) -> PortalResult<Vec<MedicationReminder>>;

    /// `POST /meds/reminder`.
    async fn create_reminder(
        &self,
        session: &Session,
        draft: ReminderDraft,
    ) -> PortalResult<MedicationReminder>;

    /// `PUT /meds/reminder/{id}/time`.
    async fn update_reminder_time(
        &self,
        session: &Session,
        reminder_id: i64,
        time: NaiveTime,
    ) -> PortalResult<()>;

    /// `POST /meds/taken/{id}` — decrements stock (clamped at zero) and
    /// logs today's dose; returns the remaining stock.
    async fn mark_taken(&self, session: &Session, reminder_id: i64) -> PortalResult<u32>;

    /// `POST /meds/missed/{id}` — no-op if today is already logged.
    async fn mark_missed(&self, session: &Session, reminder_id: i64) -> PortalResult<()>;

    /// `GET /medical-records/download/{id}` — attachment bytes;
    /// `NotFound` when the record has no file.
    async fn download_record(&self, session: &Session, record_id: i64) -> PortalResult<Vec<u8>>;
}
