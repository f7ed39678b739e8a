pub mod identity_resolution;

pub use identity_resolution::*;
