//! Identity resolution — maps a 12-digit national health identifier
//! (ABHA or Aadhaar) onto exactly one patient record, hospital master
//! store first, portal self-registrations second.

use std::sync::Arc;

use log::{debug, info, warn};

use models::{
    normalize_national_id, PatientRef, PortalError, PortalResult, RecordSource, Session,
};
use portal_api::PortalBackend;

pub struct IdentityResolutionService {
    backend: Arc<dyn PortalBackend>,
}

impl IdentityResolutionService {
    pub fn new(backend: Arc<dyn PortalBackend>) -> Self {
        Self { backend }
    }

    /// Resolves a raw identifier to a single patient record.
    ///
    /// The identifier is normalized and validated before any store is
    /// contacted; a malformed input never produces network traffic. When
    /// both stores hold a match the hospital master record wins and the
    /// registered one is never consulted.
    pub async fn resolve(
        &self,
        session: &Session,
        raw_identifier: &str,
    ) -> PortalResult<PatientRef> {
        let national_id = normalize_national_id(raw_identifier)?;
        debug!("[IDENTITY] resolving identifier ending {}", tail(&national_id));

        if let Some(patient) = self.backend.find_master_patient(session, &national_id).await? {
            info!(
                "[IDENTITY] identifier ending {} resolved in master store (id {})",
                tail(&national_id),
                patient.id
            );
            return Ok(annotated(patient, RecordSource::Master));
        }

        if let Some(patient) = self
            .backend
            .find_registered_patient(session, &national_id)
            .await?
        {
            info!(
                "[IDENTITY] identifier ending {} resolved in registered store (id {})",
                tail(&national_id),
                patient.id
            );
            return Ok(annotated(patient, RecordSource::Registered));
        }

        warn!("[IDENTITY] identifier ending {} matched no store", tail(&national_id));
        Err(PortalError::NotFound(format!(
            "no patient found for identifier ending {}",
            tail(&national_id)
        )))
    }
}

/// Every resolved record carries the store it came from; downstream
/// fetches are keyed on the compound `(id, source)`.
fn annotated(mut patient: PatientRef, source: RecordSource) -> PatientRef {
    patient.source = source;
    patient
}

/// Last four digits, for logs. Full identifiers never reach the log.
fn tail(national_id: &str) -> &str {
    &national_id[national_id.len().saturating_sub(4)..]
}
