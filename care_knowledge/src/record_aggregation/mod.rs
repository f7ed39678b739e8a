pub mod record_aggregation;

pub use record_aggregation::*;
