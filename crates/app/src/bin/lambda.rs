//! Skillgate API - AWS Lambda Runtime
//!
//! Runs the same router behind API Gateway through lambda_http.

use lambda_http::{run, Error};
use tower_http::trace::TraceLayer;
use tracing::info;

use skillgate_app::{build_cors_layer, connect_pool, create_app};
use skillgate_common::config::Config;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .without_time()
        .init();

    info!("Initializing Skillgate API Lambda");

    let config = Config::from_env().map_err(|e| Error::from(format!("Config error: {}", e)))?;

    let pool = connect_pool(&config)
        .await
        .map_err(|e| Error::from(format!("Database error: {}", e)))?;

    info!("Database connection established");

    let app = create_app(&config, pool)
        .map_err(|e| Error::from(format!("App initialization error: {}", e)))?;

    let cors_origins = config
        .cors_allowed_origins
        .clone()
        .ok_or_else(|| Error::from("CORS_ALLOWED_ORIGINS environment variable is required"))?;

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&cors_origins));

    info!("Skillgate API Lambda ready to serve requests");

    run(app).await
}
