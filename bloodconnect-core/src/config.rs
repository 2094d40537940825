//! Configuration management

use crate::error::{BloodConnectError, BloodConnectResult, ErrorContext};
use crate::logging::LoggingConfig;
use crate::types::{BloodConnectConfig, SessionConfig, StorageConfig};

use std::path::{Path, PathBuf};

impl Default for BloodConnectConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BloodConnectConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> BloodConnectResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BloodConnectError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: BloodConnectConfig =
            toml::from_str(&content).map_err(|e| BloodConnectError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> BloodConnectResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| BloodConnectError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| BloodConnectError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> BloodConnectResult<()> {
        if self.session.storage_key.trim().is_empty() {
            return Err(invalid(
                "session.storage_key must not be empty",
                "Set session.storage_key to a non-empty key",
            ));
        }

        if !self.session.login_path.starts_with('/') {
            return Err(invalid(
                "session.login_path must be an absolute path",
                "Use a path such as \"/login\"",
            ));
        }

        let admin = &self.session.bootstrap_admin;
        if admin.enabled
            && (admin.email.is_empty() || admin.password.is_empty() || admin.uid.is_empty())
        {
            return Err(invalid(
                "bootstrap_admin requires email, password and uid when enabled",
                "Fill in session.bootstrap_admin or set enabled = false",
            ));
        }

        if self.storage.users_file.is_empty()
            || self.storage.persistent_file.is_empty()
            || self.storage.transient_file.is_empty()
        {
            return Err(invalid(
                "storage file names must not be empty",
                "Set storage.users_file, storage.persistent_file and storage.transient_file",
            ));
        }

        if self.persistent_path() == self.transient_path() {
            return Err(invalid(
                "persistent and transient session media resolve to the same file",
                "Give storage.transient_file a different name or move storage.transient_dir",
            ));
        }

        Ok(())
    }

    /// Resolved data directory
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.storage.data_dir)
    }

    /// Resolved path of the user directory file
    pub fn users_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.users_file)
    }

    /// Resolved path of the persistent session medium
    pub fn persistent_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.persistent_file)
    }

    /// Resolved path of the transient session medium
    pub fn transient_path(&self) -> PathBuf {
        let dir = match &self.storage.transient_dir {
            Some(dir) => expand_home(dir),
            None => std::env::temp_dir().join("bloodconnect"),
        };
        dir.join(&self.storage.transient_file)
    }
}

fn invalid(message: &str, suggestion: &str) -> BloodConnectError {
    BloodConnectError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion(suggestion),
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BloodConnectConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.storage_key, "bloodconnect_user");
        assert_eq!(config.session.bootstrap_admin.uid, "admin-user");
    }

    #[test]
    fn test_validate_rejects_relative_login_path() {
        let mut config = BloodConnectConfig::default();
        config.session.login_path = "login".to_string();
        assert!(matches!(
            config.validate(),
            Err(BloodConnectError::Config { .. })
        ));
    }

    #[test]
    fn test_disabled_bootstrap_admin_may_be_empty() {
        let mut config = BloodConnectConfig::default();
        config.session.bootstrap_admin.enabled = false;
        config.session.bootstrap_admin.password.clear();
        assert!(config.validate().is_ok());

        config.session.bootstrap_admin.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/var/data"), PathBuf::from("/var/data"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.bloodconnect"), home.join(".bloodconnect"));
        }
    }

    #[test]
    fn test_transient_dir_override() {
        let mut config = BloodConnectConfig::default();
        config.storage.transient_dir = Some("/tmp/bc-test".to_string());
        assert_eq!(
            config.transient_path(),
            PathBuf::from("/tmp/bc-test/transient-session.json")
        );
    }

    #[test]
    fn test_validate_rejects_shared_session_file() {
        let mut config = BloodConnectConfig::default();
        config.storage.data_dir = "/srv/bloodconnect".to_string();
        config.storage.transient_dir = Some("/srv/bloodconnect".to_string());
        assert!(config.validate().is_ok());

        config.storage.transient_file = config.storage.persistent_file.clone();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("same file"));
    }
}
