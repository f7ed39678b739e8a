// care_knowledge/src/lib.rs

pub mod identity_resolution;
pub mod medication_adherence;
pub mod record_aggregation;
pub mod session;
pub mod visibility;

pub use identity_resolution::*;
pub use medication_adherence::*;
pub use record_aggregation::*;
pub use session::*;
pub use visibility::*;
