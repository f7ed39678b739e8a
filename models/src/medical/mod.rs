// models/src/medical/mod.rs

pub mod patient;
pub mod prescription;
pub mod record;
pub mod reminder;
