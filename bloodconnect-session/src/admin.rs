//! Administrative role management
//!
//! Role changes go through the directory, gated on the caller's current
//! session holding the admin role.

use crate::directory::{RoleUpdate, UserDirectory, UserRecord};
use crate::identity::Role;
use crate::manager::SessionManager;
use crate::{SessionError, SessionResult};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RoleManager {
    session: Arc<SessionManager>,
    directory: Arc<dyn UserDirectory>,
}

impl RoleManager {
    pub fn new(session: Arc<SessionManager>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { session, directory }
    }

    fn require_admin(&self) -> SessionResult<String> {
        match self.session.current_identity() {
            Some(identity) if identity.is_admin() => Ok(identity.uid),
            Some(identity) => Err(SessionError::permission(format!(
                "user {} is not an administrator",
                identity.uid
            ))),
            None => Err(SessionError::permission("not signed in")),
        }
    }

    /// Look up a user by id; admin only
    pub async fn get_user(&self, user_id: &str) -> SessionResult<Option<UserRecord>> {
        self.require_admin()?;
        self.directory.get_user_by_id(user_id).await
    }

    /// Change a user's role
    ///
    /// When the target is the signed-in user the session is reloaded so the
    /// published identity reflects the new role.
    pub async fn update_role(&self, user_id: &str, role: Role) -> SessionResult<RoleUpdate> {
        let actor = self.require_admin()?;

        let update = self.directory.update_user_role(user_id, role).await?;
        if !update.success {
            warn!(actor = %actor, target = %user_id, message = %update.message, "Role update rejected");
            return Ok(update);
        }

        info!(actor = %actor, target = %user_id, role = %role, "Role updated");

        if actor == user_id {
            self.session.reload_user().await?;
        }

        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryUserDirectory;
    use crate::identity::SignupProfile;
    use crate::navigation::TracingNavigator;
    use crate::storage::SessionStorage;
    use bloodconnect_core::SessionConfig;

    async fn setup() -> (Arc<SessionManager>, Arc<MemoryUserDirectory>, RoleManager) {
        let directory = Arc::new(MemoryUserDirectory::new());
        let session = Arc::new(SessionManager::new(
            SessionConfig::default(),
            directory.clone(),
            SessionStorage::in_memory("test_user"),
            Arc::new(TracingNavigator),
        ));
        let roles = RoleManager::new(session.clone(), directory.clone());
        (session, directory, roles)
    }

    #[tokio::test]
    async fn test_requires_admin() {
        let (session, _directory, roles) = setup().await;

        let result = roles.update_role("anyone", Role::Admin).await;
        assert!(matches!(result, Err(SessionError::PermissionDenied { .. })));

        session
            .signup(SignupProfile::new("donor@example.com", "secret1", "Donor"))
            .await
            .unwrap();
        let result = roles.update_role("anyone", Role::Admin).await;
        assert!(matches!(result, Err(SessionError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_admin_promotes_user() {
        let (session, directory, roles) = setup().await;
        let uid = directory
            .create_user(&SignupProfile::new("donor@example.com", "secret1", "Donor"))
            .await
            .unwrap();

        session
            .login("admin@roktobondhu.com", "admin123", false)
            .await
            .unwrap();

        let update = roles.update_role(&uid, Role::Admin).await.unwrap();
        assert!(update.success);

        let record = roles.get_user(&uid).await.unwrap().unwrap();
        assert_eq!(record.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_unknown_target_reports_failure() {
        let (session, _directory, roles) = setup().await;
        session
            .login("admin@roktobondhu.com", "admin123", false)
            .await
            .unwrap();

        let update = roles.update_role("missing", Role::User).await.unwrap();
        assert!(!update.success);
    }
}
