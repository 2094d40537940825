//! User directory - the document store holding donor/user records
//!
//! The session manager only talks to the [`UserDirectory`] trait. Two
//! implementations ship here: an in-memory store for tests and embedding,
//! and a JSON-file store used by the CLI.

use crate::identity::{IdentityRecord, Role, SignupProfile};
use crate::{SessionError, SessionResult};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stored user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    /// Argon2 PHC string; plaintext is never stored
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl UserRecord {
    /// Build a record from a signup profile, hashing its password
    pub fn from_profile(id: String, profile: &SignupProfile) -> SessionResult<Self> {
        Ok(Self {
            id,
            email: profile.email.clone(),
            name: profile.name.clone(),
            role: profile.role,
            password_hash: hash_password(&profile.password)?,
            created_at: Utc::now(),
            attributes: profile.attributes.clone(),
        })
    }

    /// Verify a candidate password against the stored hash
    pub fn verify_password(&self, password: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!(user_id = %self.id, error = %e, "Stored password hash is malformed");
                false
            }
        }
    }

    /// Identity view of the record; credential and timestamp are dropped
    pub fn to_identity(&self) -> IdentityRecord {
        IdentityRecord {
            uid: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            attributes: self.attributes.clone(),
        }
    }
}

/// Outcome of a role change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub success: bool,
    pub message: String,
}

/// Document store contract consumed by the session layer
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Exact, case-sensitive email match
    async fn find_user_by_email(&self, email: &str) -> SessionResult<Option<UserRecord>>;

    /// Insert a new record and return its generated identifier
    async fn create_user(&self, profile: &SignupProfile) -> SessionResult<String>;

    async fn get_user_by_id(&self, id: &str) -> SessionResult<Option<UserRecord>>;

    /// Unknown ids report `success: false` rather than failing
    async fn update_user_role(&self, id: &str, role: Role) -> SessionResult<RoleUpdate>;
}

/// In-memory user directory
///
/// Duplicate emails are stored as-is; lookups by email return the earliest
/// created match.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from existing records
    pub fn with_records(records: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    /// Insert a fully formed record, replacing any with the same id
    pub async fn insert(&self, record: UserRecord) {
        self.users.write().await.insert(record.id.clone(), record);
    }

    /// All records, oldest first
    pub async fn records(&self) -> Vec<UserRecord> {
        let mut records: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_user_by_email(&self, email: &str) -> SessionResult<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .filter(|user| user.email == email)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn create_user(&self, profile: &SignupProfile) -> SessionResult<String> {
        let id = Uuid::new_v4().to_string();
        let record = UserRecord::from_profile(id.clone(), profile)?;

        self.users.write().await.insert(id.clone(), record);

        debug!(user_id = %id, "Created user record");
        Ok(id)
    }

    async fn get_user_by_id(&self, id: &str) -> SessionResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn update_user_role(&self, id: &str, role: Role) -> SessionResult<RoleUpdate> {
        let mut users = self.users.write().await;
        match users.get_mut(id) {
            Some(user) => {
                user.role = role;
                info!(user_id = %id, role = %role, "Updated user role");
                Ok(RoleUpdate {
                    success: true,
                    message: format!("Role updated to {}", role),
                })
            }
            None => Ok(RoleUpdate {
                success: false,
                message: format!("User not found: {}", id),
            }),
        }
    }
}

/// User directory persisted as a JSON array file
///
/// Records are loaded once at open time; every mutation rewrites the file.
#[derive(Debug, Clone)]
pub struct JsonFileDirectory {
    path: PathBuf,
    inner: MemoryUserDirectory,
}

impl JsonFileDirectory {
    /// Open the directory file; a missing file starts an empty directory
    pub async fn open<P: AsRef<Path>>(path: P) -> SessionResult<Self> {
        let path = path.as_ref().to_path_buf();

        let records: Vec<UserRecord> = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                SessionError::collaborator_with_source(
                    format!("Failed to parse user directory {}", path.display()),
                    e,
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(SessionError::collaborator_with_source(
                    format!("Failed to read user directory {}", path.display()),
                    e,
                ))
            }
        };

        info!(
            "User directory opened at {} with {} records",
            path.display(),
            records.len()
        );

        Ok(Self {
            path,
            inner: MemoryUserDirectory::with_records(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self) -> SessionResult<()> {
        let records = self.inner.records().await;
        let content = serde_json::to_string_pretty(&records).map_err(|e| {
            SessionError::collaborator_with_source("Failed to encode user directory", e)
        })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SessionError::collaborator_with_source(
                    format!("Failed to create {}", parent.display()),
                    e,
                )
            })?;
        }

        tokio::fs::write(&self.path, content).await.map_err(|e| {
            SessionError::collaborator_with_source(
                format!("Failed to write user directory {}", self.path.display()),
                e,
            )
        })?;

        debug!("Flushed {} user records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for JsonFileDirectory {
    async fn find_user_by_email(&self, email: &str) -> SessionResult<Option<UserRecord>> {
        self.inner.find_user_by_email(email).await
    }

    async fn create_user(&self, profile: &SignupProfile) -> SessionResult<String> {
        let id = self.inner.create_user(profile).await?;
        self.flush().await?;
        Ok(id)
    }

    async fn get_user_by_id(&self, id: &str) -> SessionResult<Option<UserRecord>> {
        self.inner.get_user_by_id(id).await
    }

    async fn update_user_role(&self, id: &str, role: Role) -> SessionResult<RoleUpdate> {
        let update = self.inner.update_user_role(id, role).await?;
        if update.success {
            self.flush().await?;
        }
        Ok(update)
    }
}

/// Hash a password with Argon2 and a random salt
pub fn hash_password(password: &str) -> SessionResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SessionError::collaborator(format!("Failed to hash password: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(email: &str) -> SignupProfile {
        SignupProfile::new(email, "right-password", "Karim")
            .with_attribute("bloodGroup", json!("AB-"))
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let directory = MemoryUserDirectory::new();
        let id = directory.create_user(&profile("k@example.com")).await.unwrap();

        let record = directory.get_user_by_id(&id).await.unwrap().unwrap();
        assert_eq!(record.email, "k@example.com");
        assert_eq!(record.role, Role::User);
        assert_ne!(record.password_hash, "right-password");
        assert!(record.verify_password("right-password"));
        assert!(!record.verify_password("wrong-password"));

        let identity = record.to_identity();
        assert_eq!(identity.uid, id);
        assert_eq!(identity.attributes.get("bloodGroup"), Some(&json!("AB-")));
    }

    #[tokio::test]
    async fn test_find_by_email_is_exact() {
        let directory = MemoryUserDirectory::new();
        directory.create_user(&profile("k@example.com")).await.unwrap();

        assert!(directory
            .find_user_by_email("k@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(directory
            .find_user_by_email("K@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(directory
            .find_user_by_email("k@example.com ")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_emails_resolve_to_earliest() {
        let directory = MemoryUserDirectory::new();
        let first = directory.create_user(&profile("dup@example.com")).await.unwrap();
        let second = directory.create_user(&profile("dup@example.com")).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(directory.len().await, 2);
        let found = directory
            .find_user_by_email("dup@example.com")
            .await
            .unwrap()
            .unwrap();
        let earliest = directory.records().await.remove(0);
        assert_eq!(found.id, earliest.id);
    }

    #[tokio::test]
    async fn test_update_role() {
        let directory = MemoryUserDirectory::new();
        let id = directory.create_user(&profile("k@example.com")).await.unwrap();

        let update = directory.update_user_role(&id, Role::Admin).await.unwrap();
        assert!(update.success);
        let record = directory.get_user_by_id(&id).await.unwrap().unwrap();
        assert_eq!(record.role, Role::Admin);

        let missing = directory
            .update_user_role("nobody", Role::Admin)
            .await
            .unwrap();
        assert!(!missing.success);
        assert!(missing.message.contains("nobody"));
    }

    #[tokio::test]
    async fn test_malformed_hash_never_verifies() {
        let mut record = UserRecord::from_profile("id".to_string(), &profile("k@example.com"))
            .unwrap();
        record.password_hash = "right-password".to_string();
        assert!(!record.verify_password("right-password"));
    }

    #[tokio::test]
    async fn test_json_file_directory_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("users.json");

        let directory = JsonFileDirectory::open(&path).await.unwrap();
        let id = directory.create_user(&profile("k@example.com")).await.unwrap();
        directory.update_user_role(&id, Role::Admin).await.unwrap();

        let reopened = JsonFileDirectory::open(&path).await.unwrap();
        let record = reopened.get_user_by_id(&id).await.unwrap().unwrap();
        assert_eq!(record.role, Role::Admin);
        assert!(record.verify_password("right-password"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("right-password"));
    }

    #[tokio::test]
    async fn test_json_file_directory_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{ not an array").unwrap();

        assert!(matches!(
            JsonFileDirectory::open(&path).await,
            Err(SessionError::CollaboratorUnavailable { .. })
        ));
    }
}
