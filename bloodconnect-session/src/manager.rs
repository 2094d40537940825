//! Session Manager - the current identity and its lifecycle
//!
//! Owns the published [`SessionSnapshot`], mirrors the identity into the
//! storage media and resolves credentials against the user directory.
//!
//! Mutating async operations run one at a time per instance. Overlapping
//! calls queue on the in-flight guard, so the operation that publishes last
//! wins. `logout` does not wait for that guard; it bumps an epoch instead and
//! any operation that started before it drops its result.

use crate::directory::UserDirectory;
use crate::identity::{IdentityRecord, Role, SignupProfile};
use crate::navigation::Navigator;
use crate::state::SessionSnapshot;
use crate::storage::{MediumKind, SessionStorage};
use crate::{SessionError, SessionResult};
use bloodconnect_core::SessionConfig;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

pub struct SessionManager {
    config: SessionConfig,
    directory: Arc<dyn UserDirectory>,
    storage: SessionStorage,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionSnapshot>,
    in_flight: Mutex<()>,
    epoch: AtomicU64,
    alive: AtomicBool,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .field("snapshot", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Holds `loading` true for its lifetime, on every exit path
struct LoadingGuard<'a> {
    manager: &'a SessionManager,
}

impl<'a> LoadingGuard<'a> {
    fn begin(manager: &'a SessionManager) -> Self {
        manager.update(|state| state.loading = true);
        Self { manager }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.manager.update(|state| state.loading = false);
    }
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        directory: Arc<dyn UserDirectory>,
        storage: SessionStorage,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());

        Self {
            config,
            directory,
            storage,
            navigator,
            state,
            in_flight: Mutex::new(()),
            epoch: AtomicU64::new(0),
            alive: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Subscribe to published snapshots
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<IdentityRecord> {
        self.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop publishing; results of operations still in flight are dropped
    pub fn dispose(&self) {
        self.alive.store(false, Ordering::SeqCst);
        debug!("Session manager disposed");
    }

    /// Restore the identity cached in storage
    ///
    /// The cached snapshot is trusted as-is; call [`reload_user`] to
    /// revalidate it against the directory. A corrupt entry is wiped from
    /// both media and the session starts unauthenticated.
    ///
    /// [`reload_user`]: SessionManager::reload_user
    pub async fn initialize(&self) -> Option<IdentityRecord> {
        let _flight = self.in_flight.lock().await;
        let _loading = LoadingGuard::begin(self);

        let identity = match self.storage.load() {
            Some((kind, raw)) => match IdentityRecord::from_snapshot(&raw) {
                Ok(identity) => {
                    info!(uid = %identity.uid, medium = %kind, "Restored session from storage");
                    Some(identity)
                }
                Err(e) => {
                    warn!(medium = %kind, error = %e, "Discarding corrupt session entry");
                    self.storage.clear_all();
                    None
                }
            },
            None => {
                debug!("No stored session");
                None
            }
        };

        let published = identity.clone();
        self.update(move |state| state.identity = published);
        identity
    }

    /// Authenticate with email and password
    ///
    /// `remember` selects the persistent medium; otherwise the identity only
    /// lives in the transient one. Whatever the other medium held from an
    /// earlier login is dropped. On failure the published identity is left
    /// untouched.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> SessionResult<IdentityRecord> {
        let _flight = self.in_flight.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        let _loading = LoadingGuard::begin(self);

        let identity = match self.bootstrap_login(email, password) {
            Some(identity) => {
                info!(uid = %identity.uid, "Bootstrap administrator login");
                identity
            }
            None => {
                let record = self
                    .directory
                    .find_user_by_email(email)
                    .await?
                    .ok_or_else(|| {
                        debug!(email = %email, "Login failed: unknown email");
                        SessionError::InvalidCredentials
                    })?;

                if !record.verify_password(password) {
                    warn!(email = %email, "Login failed: wrong password");
                    return Err(SessionError::InvalidCredentials);
                }

                record.to_identity()
            }
        };

        self.ensure_current(epoch)?;

        let medium = if remember {
            MediumKind::Persistent
        } else {
            MediumKind::Transient
        };
        self.storage.store(medium, &identity);
        self.publish(Some(identity.clone()));

        info!(uid = %identity.uid, role = %identity.role, medium = %medium, "Logged in");
        Ok(identity)
    }

    /// Register a new user and sign them in for this browsing session
    ///
    /// New signups always land in the transient medium. No duplicate-email
    /// check happens here; that is up to the directory.
    pub async fn signup(&self, mut profile: SignupProfile) -> SessionResult<IdentityRecord> {
        let _flight = self.in_flight.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);
        let _loading = LoadingGuard::begin(self);

        profile.normalize();
        profile.validate()?;

        let uid = self.directory.create_user(&profile).await?;
        let identity = profile.into_identity(uid);

        self.ensure_current(epoch)?;

        self.storage.store(MediumKind::Transient, &identity);
        self.publish(Some(identity.clone()));

        info!(uid = %identity.uid, "Signed up new user");
        Ok(identity)
    }

    /// Clear the identity from state and both media, then hard-reset navigation
    ///
    /// Safe to call repeatedly.
    pub fn logout(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let previous = self.current_identity();

        self.publish(None);
        self.storage.clear_all();

        if let Some(identity) = previous {
            info!(uid = %identity.uid, "Logged out");
        }
        self.navigator.hard_reset(&self.config.login_path);
    }

    /// Re-fetch the current identity from the directory
    ///
    /// No-op without a current identity. A record that no longer exists
    /// signs the session out of the medium that held it. A directory failure
    /// keeps the current identity and is returned to the caller.
    pub async fn reload_user(&self) -> SessionResult<Option<IdentityRecord>> {
        if self.current_identity().is_none() {
            return Ok(None);
        }

        let _flight = self.in_flight.lock().await;
        // A queued logout may have cleared it while we waited
        let Some(current) = self.current_identity() else {
            return Ok(None);
        };
        let epoch = self.epoch.load(Ordering::SeqCst);
        let _loading = LoadingGuard::begin(self);

        let medium = self.storage.locate().unwrap_or(MediumKind::Transient);

        if self.is_bootstrap_identity(&current) {
            self.storage.store(medium, &current);
            self.publish(Some(current.clone()));
            return Ok(Some(current));
        }

        let refreshed = self
            .directory
            .get_user_by_id(&current.uid)
            .await
            .inspect_err(|e| warn!(uid = %current.uid, error = %e, "Reload failed"))?;

        self.ensure_current(epoch)?;

        match refreshed {
            Some(record) => {
                let identity = record.to_identity();
                self.storage.store(medium, &identity);
                self.publish(Some(identity.clone()));
                debug!(uid = %identity.uid, medium = %medium, "Reloaded user");
                Ok(Some(identity))
            }
            None => {
                info!(uid = %current.uid, "User no longer exists, clearing session");
                self.publish(None);
                self.storage.clear(medium);
                Ok(None)
            }
        }
    }

    fn bootstrap_login(&self, email: &str, password: &str) -> Option<IdentityRecord> {
        let admin = &self.config.bootstrap_admin;
        if admin.enabled && email == admin.email && password == admin.password {
            Some(
                IdentityRecord::new(admin.uid.as_str(), admin.email.as_str(), admin.name.as_str())
                    .with_role(Role::Admin),
            )
        } else {
            None
        }
    }

    fn is_bootstrap_identity(&self, identity: &IdentityRecord) -> bool {
        let admin = &self.config.bootstrap_admin;
        admin.enabled && identity.uid == admin.uid
    }

    fn ensure_current(&self, epoch: u64) -> SessionResult<()> {
        if self.epoch.load(Ordering::SeqCst) == epoch {
            Ok(())
        } else {
            debug!("Discarding result of an operation that started before logout");
            Err(SessionError::Superseded)
        }
    }

    fn publish(&self, identity: Option<IdentityRecord>) {
        self.update(move |state| state.identity = identity);
    }

    fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        if !self.is_alive() {
            debug!("Ignoring state update on a disposed session manager");
            return;
        }

        self.state.send_modify(|state| {
            f(state);
            state.settle_phase();
            state.version += 1;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryUserDirectory;
    use crate::navigation::TracingNavigator;
    use crate::state::SessionPhase;

    fn manager() -> SessionManager {
        SessionManager::new(
            SessionConfig::default(),
            Arc::new(MemoryUserDirectory::new()),
            SessionStorage::in_memory("test_user"),
            Arc::new(TracingNavigator),
        )
    }

    #[tokio::test]
    async fn test_phase_transitions() {
        let manager = manager();
        assert_eq!(manager.snapshot().phase, SessionPhase::Uninitialized);

        assert!(manager.initialize().await.is_none());
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
        assert!(!snapshot.loading);

        manager
            .login("admin@roktobondhu.com", "admin123", false)
            .await
            .unwrap();
        assert_eq!(manager.snapshot().phase, SessionPhase::Authenticated);

        manager.logout();
        assert_eq!(manager.snapshot().phase, SessionPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_loading_cleared_after_failure() {
        let manager = manager();
        let mut rx = manager.subscribe();

        let result = manager.login("nobody@example.com", "x", false).await;
        assert!(matches!(result, Err(SessionError::InvalidCredentials)));
        assert!(!manager.is_loading());
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().loading);
    }

    #[tokio::test]
    async fn test_disposed_manager_stops_publishing() {
        let manager = manager();
        manager.dispose();

        let identity = manager
            .login("admin@roktobondhu.com", "admin123", true)
            .await
            .unwrap();
        assert_eq!(identity.uid, "admin-user");
        assert!(manager.current_identity().is_none());
        assert_eq!(manager.snapshot().version, 0);
    }

    #[tokio::test]
    async fn test_versions_increase() {
        let manager = manager();
        let before = manager.snapshot().version;
        manager.initialize().await;
        let after_init = manager.snapshot().version;
        assert!(after_init > before);

        manager.logout();
        assert!(manager.snapshot().version > after_init);
    }
}
