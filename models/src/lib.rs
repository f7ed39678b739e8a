// models/src/lib.rs

// Declare all top-level modules within the 'models' crate
pub mod errors;
pub mod roles;

// Declare the 'medical' sub-module
pub mod medical;

// Re-export common core types for convenience when other crates use 'models::*'
pub use errors::{PortalError, PortalResult, ValidationError};
pub use roles::{Role, Session};
pub use medical::patient::{normalize_national_id, PatientKey, PatientRef, RecordSource, RiskLevel};
pub use medical::record::{RecordDraft, RecordProducer, SuggestionDraft, TimelineEntry};
pub use medical::prescription::Prescription;
pub use medical::reminder::{
    format_reminder_time, parse_reminder_time, MedicationReminder, ReminderDraft, ReminderPhase,
    StockAdvisory, TodayStatus,
};
