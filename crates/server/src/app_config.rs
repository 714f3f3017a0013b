//! Application configuration builders.
//!
//! Loads `Config` and turns the server section into middleware.

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Load configuration from `.env` and environment variables.
pub fn load_config() -> smartd_core::Config {
    smartd_core::config::load_dotenv();
    smartd_core::Config::from_env()
}

/// CORS for the playground frontend. Session cookies need credentials, so a
/// concrete origin is required; `*` falls back to a permissive layer without them.
pub fn build_cors_layer(server: &smartd_core::config::ServerConfig) -> CorsLayer {
    let origin = server.cors_origin.trim();
    if origin == "*" {
        info!("CORS: permissive (credentials disabled)");
        return CorsLayer::permissive();
    }

    match origin.parse::<HeaderValue>() {
        Ok(value) => {
            info!("CORS: allowing credentials from {}", origin);
            CorsLayer::new()
                .allow_origin(value)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-csrftoken")])
                .allow_credentials(true)
        }
        Err(e) => {
            warn!("Invalid CORS_ORIGIN '{}': {} — falling back to permissive", origin, e);
            CorsLayer::permissive()
        }
    }
}
