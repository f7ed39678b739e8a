// portal_api/src/lib.rs

pub mod backend;
pub mod config;
pub mod mock;

pub use backend::PortalBackend;
pub use config::PortalConfig;
pub use mock::MockPortal;
