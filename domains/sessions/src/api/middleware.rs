//! Sessions domain state and auth backend integration

use std::sync::Arc;

use crate::SessionsRepositories;
use axum::extract::FromRef;
use skillgate_auth::AuthBackend;
use skillgate_content::ContentProvider;

pub use skillgate_auth::{AdminUser, AuthUser};

/// Application state for the sessions domain
#[derive(Clone)]
pub struct SessionsState {
    pub repos: SessionsRepositories,
    pub auth: AuthBackend,
    pub content: Arc<dyn ContentProvider>,
}

impl FromRef<SessionsState> for AuthBackend {
    fn from_ref(state: &SessionsState) -> Self {
        state.auth.clone()
    }
}
