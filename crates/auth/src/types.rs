//! Actor types consumed by the domains
//!
//! Identity lives with an external provider; the service only sees an opaque
//! actor id and a role taken from the verified token.

use serde::Serialize;
use uuid::Uuid;

/// Role of the authenticated actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    User,
    Admin,
}

impl ActorRole {
    /// Map the identity provider's role claim. Unknown roles are ordinary users.
    pub fn from_claim(role: &str) -> Self {
        match role.to_ascii_lowercase().as_str() {
            "admin" | "staff" | "super_admin" => ActorRole::Admin,
            _ => ActorRole::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ActorRole::Admin)
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::User => write!(f, "user"),
            ActorRole::Admin => write!(f, "admin"),
        }
    }
}

/// The current actor of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
    pub email: Option<String>,
}
