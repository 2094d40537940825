//! Identity records
//!
//! The authenticated principal as known to the client, and the profile a new
//! donor signs up with.

use crate::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute key normalized to an explicit null on signup
pub const LAST_DONATION_KEY: &str = "lastDonation";

/// Role of an identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// The current authenticated principal
///
/// Serialized as a flat camelCase JSON object; any profile attributes beyond
/// the fixed fields (blood group, phone, location, ...) live in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub uid: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl IdentityRecord {
    pub fn new(uid: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            name: name.into(),
            role: Role::User,
            attributes: Map::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Serialized snapshot kept in a storage medium
    pub fn to_snapshot(&self) -> SessionResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a serialized snapshot
    pub fn from_snapshot(raw: &str) -> SessionResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Profile submitted on signup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupProfile {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Must stay [`Role::User`]; promotion goes through `RoleManager`
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl SignupProfile {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name.into(),
            role: Role::User,
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Make an absent `lastDonation` an explicit null
    pub fn normalize(&mut self) {
        self.attributes
            .entry(LAST_DONATION_KEY)
            .or_insert(Value::Null);
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.email.trim().is_empty() {
            return Err(SessionError::validation("email is required"));
        }
        if self.name.trim().is_empty() {
            return Err(SessionError::validation("name is required"));
        }
        if self.password.is_empty() {
            return Err(SessionError::validation("password is required"));
        }
        if self.role != Role::User {
            return Err(SessionError::validation(format!(
                "signup cannot request the {} role",
                self.role
            )));
        }
        Ok(())
    }

    /// Merge a generated identifier into the profile; the password is dropped
    pub fn into_identity(self, uid: impl Into<String>) -> IdentityRecord {
        IdentityRecord {
            uid: uid.into(),
            email: self.email,
            name: self.name,
            role: self.role,
            attributes: self.attributes,
        }
    }
}
