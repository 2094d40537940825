//! Published session state

use crate::identity::IdentityRecord;
use serde::Serialize;

/// Lifecycle phase of a session manager instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Loading,
    Authenticated,
    Unauthenticated,
}

/// What subscribers see: the current identity and whether a resolution is in flight
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub identity: Option<IdentityRecord>,
    pub loading: bool,
    pub phase: SessionPhase,
    /// Incremented on every publish
    pub version: u64,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.identity.as_ref().is_some_and(IdentityRecord::is_admin)
    }

    /// Recompute `phase` from `loading` and `identity`
    pub(crate) fn settle_phase(&mut self) {
        self.phase = if self.loading {
            SessionPhase::Loading
        } else if self.identity.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        };
    }
}
