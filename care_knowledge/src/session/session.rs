//! Session guard — role authorization for routes and the single teardown
//! path every authentication failure funnels into.

use log::{info, warn};
use tokio::sync::RwLock;

use models::{PortalError, PortalResult, Role, Session};

/// Route-level authorization. Holds no state; the decision is a pure
/// function of the session role and the route's requirement.
pub struct SessionGuard;

impl SessionGuard {
    /// Whether `role` may enter a route requiring one of `required`.
    ///
    /// An empty requirement means any authenticated session passes. Admin
    /// additionally passes any requirement that admits a clinical role.
    pub fn authorize(role: Role, required: &[Role]) -> bool {
        if required.is_empty() || required.contains(&role) {
            return true;
        }
        role == Role::Admin && required.iter().any(Role::is_clinical)
    }

    pub fn check(session: &Session, required: &[Role]) -> PortalResult<()> {
        if Self::authorize(session.role, required) {
            Ok(())
        } else {
            warn!(
                "[SESSION] {} ({}) denied access to a {:?}-only route",
                session.display_name, session.role, required
            );
            Err(PortalError::Auth(format!(
                "role {} is not permitted here",
                session.role
            )))
        }
    }
}

/// Owns the one live session. Teardown is idempotent and total: after a
/// 401 from any call, nothing retains a usable token.
#[derive(Default)]
pub struct SessionManager {
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sign_in(&self, session: Session) {
        info!("[SESSION] {} signed in as {}", session.display_name, session.role);
        *self.current.write().await = Some(session);
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Drops the session. Safe to call repeatedly.
    pub async fn tear_down(&self) {
        let mut current = self.current.write().await;
        if let Some(session) = current.take() {
            info!("[SESSION] session for {} torn down", session.display_name);
        }
    }

    /// Routes a service error through the teardown policy: auth failures
    /// end the session before the error continues up.
    pub async fn absorb<T>(&self, result: PortalResult<T>) -> PortalResult<T> {
        if let Err(err) = &result {
            if err.is_auth() {
                warn!("[SESSION] authentication failure, tearing session down");
                self.tear_down().await;
            }
        }
        result
    }
}
