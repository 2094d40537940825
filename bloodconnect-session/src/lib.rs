//! BloodConnect Session - client-side session management
//!
//! Keeps the current authenticated identity, mirrors it into a persistent or
//! transient storage medium, and validates credentials against an injected
//! user directory. UI-facing consumers subscribe to [`SessionSnapshot`]s and
//! gate routes with [`guard::evaluate`].

pub mod admin;
pub mod directory;
pub mod guard;
pub mod identity;
pub mod manager;
pub mod navigation;
pub mod state;
pub mod storage;

pub use admin::RoleManager;
pub use directory::{
    hash_password, JsonFileDirectory, MemoryUserDirectory, RoleUpdate, UserDirectory, UserRecord,
};
pub use guard::{evaluate, GuardDecision, RouteAccess};
pub use identity::{IdentityRecord, Role, SignupProfile};
pub use manager::SessionManager;
pub use navigation::{Navigator, TracingNavigator};
pub use state::{SessionPhase, SessionSnapshot};
pub use storage::{FileMedium, MediumKind, MemoryMedium, SessionStorage, StorageMedium};

use bloodconnect_core::{BloodConnectError, ErrorContext};
use thiserror::Error;

/// Session layer errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User directory unavailable: {message}")]
    CollaboratorUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Corrupt session entry: {0}")]
    CorruptSessionEntry(#[from] serde_json::Error),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Operation superseded by logout")]
    Superseded,
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Create a collaborator error
    pub fn collaborator<S: Into<String>>(message: S) -> Self {
        Self::CollaboratorUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a collaborator error with source
    pub fn collaborator_with_source<S: Into<String>>(
        message: S,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::CollaboratorUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a permission error
    pub fn permission<S: Into<String>>(message: S) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }
}

impl From<SessionError> for BloodConnectError {
    fn from(error: SessionError) -> Self {
        let context = ErrorContext::new("session");
        match error {
            SessionError::InvalidCredentials => BloodConnectError::Authentication {
                message: "Invalid email or password".to_string(),
                context: context.with_suggestion("Check the email and password"),
            },
            SessionError::PermissionDenied { message } => BloodConnectError::Authentication {
                message,
                context: context.with_suggestion("Log in with an administrator account"),
            },
            SessionError::CollaboratorUnavailable { message, source } => {
                BloodConnectError::Directory {
                    message,
                    source,
                    context: context.with_suggestion("Check that the user directory is reachable"),
                }
            }
            SessionError::CorruptSessionEntry(e) => BloodConnectError::Serialization(e),
            SessionError::Storage { message } => BloodConnectError::Storage { message, context },
            SessionError::Validation { message } => BloodConnectError::Validation { message, context },
            SessionError::Superseded => BloodConnectError::Internal {
                message: "Operation superseded by logout".to_string(),
                context,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_errors_are_recoverable() {
        let error: BloodConnectError = SessionError::collaborator("offline").into();
        assert!(error.is_recoverable());
        assert!(matches!(error, BloodConnectError::Directory { .. }));
    }

    #[test]
    fn test_credential_errors_map_to_authentication() {
        let error: BloodConnectError = SessionError::InvalidCredentials.into();
        assert!(!error.is_recoverable());
        assert!(error
            .context()
            .is_some_and(|context| !context.recovery_suggestions.is_empty()));

        let error: BloodConnectError = SessionError::permission("not an admin").into();
        assert!(matches!(error, BloodConnectError::Authentication { .. }));
    }
}
