pub mod medication_adherence;

pub use medication_adherence::*;
