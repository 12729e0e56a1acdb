//! JWT claims types

use serde::{Deserialize, Serialize};

/// Claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (actor ID)
    pub sub: String,
    /// Role of the actor (`admin`, `staff`, anything else is a plain user)
    #[serde(default)]
    pub role: String,
    /// Email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Issued at
    pub iat: u64,
    /// Expires at
    pub exp: u64,
}
