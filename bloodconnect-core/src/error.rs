//! Shared error type
//!
//! Every crate-level error converts into [`BloodConnectError`], which carries
//! an [`ErrorContext`] naming where it happened and what the user can do next.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

pub type BloodConnectResult<T> = Result<T, BloodConnectError>;

/// Where an error came from and how to recover
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    /// Correlates the printed error with its log line
    pub error_id: String,
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub operation: Option<String>,
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

#[derive(Error, Debug)]
pub enum BloodConnectError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        context: ErrorContext,
    },

    #[error("User directory error: {message}")]
    Directory {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

impl BloodConnectError {
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Config { context, .. }
            | Self::Storage { context, .. }
            | Self::Directory { context, .. }
            | Self::Authentication { context, .. }
            | Self::Validation { context, .. }
            | Self::Internal { context, .. } => Some(context),
            Self::Io(_) | Self::Serialization(_) => None,
        }
    }

    /// Recovery suggestions, empty for context-free variants
    pub fn suggestions(&self) -> &[String] {
        self.context()
            .map(|context| context.recovery_suggestions.as_slice())
            .unwrap_or_default()
    }

    /// Only a collaborator outage is worth retrying from the caller's side;
    /// the session layer itself never retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }

    /// Emit the error once, at `warn` for user-caused failures and `error`
    /// for everything else
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        let component = self.context().map(|c| c.component.as_str());

        match self {
            Self::Authentication { .. } | Self::Validation { .. } | Self::Directory { .. } => {
                warn!(?error_id, ?component, error = %self, "Request rejected");
            }
            _ => {
                error!(?error_id, ?component, error = %self, "Operation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let context = ErrorContext::new("session")
            .with_operation("login")
            .with_suggestion("Retry later");

        assert_eq!(context.component, "session");
        assert_eq!(context.operation.as_deref(), Some("login"));
        assert_eq!(context.recovery_suggestions, vec!["Retry later"]);
        assert!(!context.error_id.is_empty());
    }

    #[test]
    fn test_only_directory_errors_are_recoverable() {
        let directory = BloodConnectError::Directory {
            message: "store offline".to_string(),
            source: None,
            context: ErrorContext::new("directory"),
        };
        assert!(directory.is_recoverable());

        let auth = BloodConnectError::Authentication {
            message: "Invalid email or password".to_string(),
            context: ErrorContext::new("session").with_suggestion("Check the password"),
        };
        assert!(!auth.is_recoverable());
        assert_eq!(auth.suggestions(), ["Check the password"]);

        let io: BloodConnectError = std::io::Error::other("disk").into();
        assert!(!io.is_recoverable());
        assert!(io.suggestions().is_empty());
    }
}
