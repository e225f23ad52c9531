pub mod token;

pub use token::{TokenController, TokenRequest, TokenResponse};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::ServerConfig;

/// Build CORS layer based on the configured origins
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if config.allowed_origins.is_empty() {
        cors.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> =
            config.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

/// Create the token server application
pub fn create_app(config: ServerConfig) -> Router {
    let token_controller = TokenController::new(config.issuer());

    let api_router = Router::new()
        .route("/health", get(health_check))
        .route("/token", get(token::token_from_query).post(token::token_from_body))
        .with_state(token_controller);

    let mut app = Router::new().nest("/api", api_router).route("/health", get(health_check));

    if let Some(dir) = &config.static_dir {
        tracing::info!(dir = %dir.display(), "Serving static files");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).layer(build_cors_layer(&config))
}

async fn health_check() -> &'static str {
    "OK"
}
