//! Concrete authentication backend
//!
//! Verifies bearer tokens against the identity provider's shared secret and
//! turns the claims into an opaque actor. No user table is consulted.

use uuid::Uuid;

use crate::config::AuthConfig;
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::types::{Actor, ActorRole};

/// Concrete authentication backend.
///
/// Domain states expose this via `FromRef`:
/// ```ignore
/// impl FromRef<MyDomainState> for AuthBackend {
///     fn from_ref(state: &MyDomainState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthBackend {
    config: AuthConfig,
}

impl AuthBackend {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Validate a bearer token and build the request context
    pub fn authenticate_jwt(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = crate::jwt::validate_jwt_token(token, &self.config)?;

        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidUserId)?;

        Ok(AuthContext::new(Actor {
            id,
            role: ActorRole::from_claim(&claims.role),
            email: claims.email,
        }))
    }
}
