//! Access domain state and auth backend integration

use crate::AccessRepositories;
use axum::extract::FromRef;
use skillgate_auth::AuthBackend;

pub use skillgate_auth::{AdminUser, AuthUser};

/// Application state for the access domain
#[derive(Clone)]
pub struct AccessState {
    pub repos: AccessRepositories,
    pub auth: AuthBackend,
}

impl FromRef<AccessState> for AuthBackend {
    fn from_ref(state: &AccessState) -> Self {
        state.auth.clone()
    }
}
