//! Skillgate application composition root
//!
//! Composes the access and sessions routers into a single application and
//! owns the HTTP-level bounds: request timeout, body size and CORS.

use std::sync::Arc;

use axum::{http::HeaderValue, Router};
use skillgate_access::{AccessRepositories, AccessState};
use skillgate_auth::{AuthBackend, AuthConfig};
use skillgate_common::config::Config;
use skillgate_content::{ContentConfig, ContentProvider, ContentProviderFactory};
use skillgate_sessions::{SessionsRepositories, SessionsState};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
};

/// Largest accepted request body; covers the typed-text and keystroke caps
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Open the shared connection pool with the configured bounds
pub async fn connect_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_acquire_timeout())
        .connect(&config.database_url)
        .await
}

/// Create the main application router with all routes and middleware
pub fn create_app(config: &Config, pool: PgPool) -> Result<Router, anyhow::Error> {
    let auth = AuthBackend::new(AuthConfig {
        jwt_secret: config.jwt_secret.clone(),
        issuer: config.jwt_issuer.clone(),
        audience: config.jwt_audience.clone(),
    });

    let content = ContentProviderFactory::create(ContentConfig::from(config))?;

    Ok(build_router(config, pool, auth, content))
}

/// Compose the domain routers around explicit collaborators
pub fn build_router(
    config: &Config,
    pool: PgPool,
    auth: AuthBackend,
    content: Arc<dyn ContentProvider>,
) -> Router {
    let timeout = config.request_timeout();

    let access_state = AccessState {
        repos: AccessRepositories::new(pool.clone()).with_statement_timeout(timeout),
        auth: auth.clone(),
    };

    let sessions_state = SessionsState {
        repos: SessionsRepositories::new(pool).with_statement_timeout(timeout),
        auth,
        content,
    };

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { "Skillgate API v0.0.1-SNAPSHOT" }),
        )
        .merge(skillgate_access::routes().with_state(access_state))
        .merge(skillgate_sessions::routes().with_state(sessions_state))
        .layer(TimeoutLayer::new(timeout))
        .layer(body_limit_layer())
}

/// CORS from a comma-separated origin list; `*` or an empty list allows any
pub fn build_cors_layer(origins: &str) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn body_limit_layer() -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(MAX_BODY_BYTES)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use skillgate_content::mock::MockContentProvider;
    use tower::ServiceExt;

    fn config() -> Config {
        Config {
            database_url: "postgresql://localhost/skillgate".to_string(),
            jwt_secret: "secret".to_string(),
            jwt_issuer: None,
            jwt_audience: None,
            content_provider: "mock".to_string(),
            content_api_url: None,
            content_api_key: None,
            db_max_connections: 1,
            db_acquire_timeout_secs: 1,
            request_timeout_secs: 5,
            cors_allowed_origins: None,
            rust_log: "info".to_string(),
            port: 3000,
        }
    }

    fn router() -> Router {
        let config = config();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        build_router(
            &config,
            pool,
            AuthBackend::new(AuthConfig::with_secret("secret")),
            Arc::new(MockContentProvider::new()),
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = router()
            .oneshot(Request::get("/v1/entitlements").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_route_requires_token() {
        let response = router()
            .oneshot(
                Request::delete(format!("/v1/admin/tests/{}", uuid_like()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn uuid_like() -> &'static str {
        "00000000-0000-4000-8000-000000000001"
    }

    #[test]
    fn test_cors_layer_accepts_lists_and_wildcard() {
        let _ = build_cors_layer("*");
        let _ = build_cors_layer("");
        let _ = build_cors_layer("https://app.skillgate.dev, https://admin.skillgate.dev");
    }
}
