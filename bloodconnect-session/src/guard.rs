//! Route guards
//!
//! Pure decisions over a [`SessionSnapshot`]; the UI performs the redirect.

use crate::state::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Access level a route requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAccess {
    Public,
    Authenticated,
    AdminOnly,
}

impl std::str::FromStr for RouteAccess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(RouteAccess::Public),
            "authenticated" | "auth" => Ok(RouteAccess::Authenticated),
            "admin" | "adminonly" | "admin-only" => Ok(RouteAccess::AdminOnly),
            _ => Err(format!("Unknown route access level: {}", s)),
        }
    }
}

/// What the guard tells the UI to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    /// Identity resolution still in flight; render a spinner
    Wait,
    Allow,
    RedirectToLogin,
    /// Authenticated but lacking the admin role
    RedirectHome,
}

/// Decide whether the current session may enter a route
pub fn evaluate(snapshot: &SessionSnapshot, access: RouteAccess) -> GuardDecision {
    if access == RouteAccess::Public {
        return GuardDecision::Allow;
    }

    if snapshot.loading {
        return GuardDecision::Wait;
    }

    match &snapshot.identity {
        None => GuardDecision::RedirectToLogin,
        Some(identity) if access == RouteAccess::AdminOnly && !identity.is_admin() => {
            GuardDecision::RedirectHome
        }
        Some(_) => GuardDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityRecord, Role};

    fn snapshot(identity: Option<IdentityRecord>, loading: bool) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot {
            identity,
            loading,
            ..Default::default()
        };
        snapshot.settle_phase();
        snapshot
    }

    #[test]
    fn test_public_routes_always_allowed() {
        assert_eq!(
            evaluate(&snapshot(None, true), RouteAccess::Public),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_wait_while_loading() {
        let user = IdentityRecord::new("u", "u@example.com", "U");
        assert_eq!(
            evaluate(&snapshot(Some(user), true), RouteAccess::AdminOnly),
            GuardDecision::Wait
        );
        assert_eq!(
            evaluate(&snapshot(None, true), RouteAccess::Authenticated),
            GuardDecision::Wait
        );
    }

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        assert_eq!(
            evaluate(&snapshot(None, false), RouteAccess::Authenticated),
            GuardDecision::RedirectToLogin
        );
        assert_eq!(
            evaluate(&snapshot(None, false), RouteAccess::AdminOnly),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_admin_only_routes() {
        let user = IdentityRecord::new("u", "u@example.com", "U");
        let admin = user.clone().with_role(Role::Admin);

        assert_eq!(
            evaluate(&snapshot(Some(user.clone()), false), RouteAccess::AdminOnly),
            GuardDecision::RedirectHome
        );
        assert_eq!(
            evaluate(&snapshot(Some(user), false), RouteAccess::Authenticated),
            GuardDecision::Allow
        );
        assert_eq!(
            evaluate(&snapshot(Some(admin), false), RouteAccess::AdminOnly),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_parse_route_access() {
        assert_eq!("admin".parse::<RouteAccess>().unwrap(), RouteAccess::AdminOnly);
        assert_eq!(
            "Authenticated".parse::<RouteAccess>().unwrap(),
            RouteAccess::Authenticated
        );
        assert!("vip".parse::<RouteAccess>().is_err());
    }
}
