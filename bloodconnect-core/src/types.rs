//! Core configuration type definitions

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for BloodConnect Pro clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodConnectConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session manager behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key the serialized identity is stored under in both storage media
    pub storage_key: String,
    /// Entry point a logout hard-resets to
    pub login_path: String,
    /// Operator credential that resolves without consulting the user directory
    pub bootstrap_admin: BootstrapAdminConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: "bloodconnect_user".to_string(),
            login_path: "/login".to_string(),
            bootstrap_admin: BootstrapAdminConfig::default(),
        }
    }
}

/// Bootstrap administrator used before any real admin account exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapAdminConfig {
    pub enabled: bool,
    pub email: String,
    pub password: String,
    pub uid: String,
    pub name: String,
}

impl Default for BootstrapAdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            email: "admin@roktobondhu.com".to_string(),
            password: "admin123".to_string(), // Default password - should be changed in production
            uid: "admin-user".to_string(),
            name: "Admin".to_string(),
        }
    }
}

/// Locations of the file-backed storage media and user directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for durable data (`~` is expanded)
    pub data_dir: String,
    /// User directory file, relative to `data_dir`
    pub users_file: String,
    /// Persistent session medium file, relative to `data_dir`
    pub persistent_file: String,
    /// Directory for the transient session medium; the OS temp dir when unset
    pub transient_dir: Option<String>,
    /// Transient session medium file, relative to the transient directory
    pub transient_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.bloodconnect/data".to_string(),
            users_file: "users.json".to_string(),
            persistent_file: "session.json".to_string(),
            transient_dir: None,
            transient_file: "transient-session.json".to_string(),
        }
    }
}
