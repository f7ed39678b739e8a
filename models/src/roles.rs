//! Roles and the explicit session value threaded through service calls.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{PortalError, PortalResult};
use crate::medical::patient::PatientKey;

/// Closed set of actor roles. Fixed at authentication time for the session
/// lifetime; determines the visibility policy and writable fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Staff,
    Patient,
}

impl Role {
    /// Doctor and staff are the clinical roles; admin supersets them for
    /// route access but not for field authorship.
    pub fn is_clinical(&self) -> bool {
        matches!(self, Role::Doctor | Role::Staff)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Staff => "staff",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> PortalResult<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "staff" => Ok(Role::Staff),
            "patient" => Ok(Role::Patient),
            other => Err(PortalError::Auth(format!("unknown role '{}'", other))),
        }
    }
}

/// Authenticated caller context. Created on login, replaced on refresh,
/// destroyed on logout or any 401 — never ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub role: Role,
    /// Backend user id for clinical/admin users, registered-patient id for
    /// patient sessions.
    pub subject_id: i64,
    pub display_name: String,
    /// Set only for patient sessions; the sole record they may read.
    pub patient_key: Option<PatientKey>,
}

impl Session {
    pub fn new(token: impl Into<String>, role: Role, subject_id: i64, name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            role,
            subject_id,
            display_name: name.into(),
            patient_key: None,
        }
    }

    /// Patient login carries the compound `(id, source)` key of the one
    /// record the session is allowed to see.
    pub fn for_patient(token: impl Into<String>, key: PatientKey, name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            role: Role::Patient,
            subject_id: key.id,
            display_name: name.into(),
            patient_key: Some(key),
        }
    }

    pub fn owns(&self, key: &PatientKey) -> bool {
        self.patient_key.as_ref() == Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, Session};
    use crate::medical::patient::{PatientKey, RecordSource};
    use std::str::FromStr;

    #[test]
    fn should_parse_known_roles() {
        assert_eq!(Role::from_str("doctor").unwrap(), Role::Doctor);
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert!(Role::from_str("superuser").is_err());
    }

    #[test]
    fn should_mark_clinical_roles() {
        assert!(Role::Doctor.is_clinical());
        assert!(Role::Staff.is_clinical());
        assert!(!Role::Admin.is_clinical());
        assert!(!Role::Patient.is_clinical());
    }

    #[test]
    fn should_scope_patient_sessions_to_their_key() {
        let key = PatientKey { id: 7, source: RecordSource::Registered };
        let other = PatientKey { id: 8, source: RecordSource::Registered };
        let session = Session::for_patient("tok", key, "Asha");
        assert!(session.owns(&key));
        assert!(!session.owns(&other));
    }
}
