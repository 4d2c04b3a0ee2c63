//! Router assembly: module routes, health check and CORS.

use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::clients::{ClientRouteState, client_routes};
use crate::config::ServerConfig;
use crate::onboarding::{OnboardingRouteState, OnboardingService, onboarding_routes};
use crate::site::{SiteRouteState, site_routes};
use crate::store::Database;

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "formation-desk",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the complete application router.
pub fn build_router(db: Arc<dyn Database>, config: Arc<ServerConfig>) -> Router {
    let cors = cors_layer(&config);

    let clients = client_routes(ClientRouteState {
        db: Arc::clone(&db),
        config: Arc::clone(&config),
    });
    let onboarding = onboarding_routes(OnboardingRouteState {
        service: Arc::new(OnboardingService::new(Arc::clone(&db))),
    });
    let site = site_routes(SiteRouteState { db });

    Router::new()
        .route("/health", get(health))
        .merge(clients)
        .merge(onboarding)
        .merge(site)
        .layer(cors)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]);

    if config.cors_allows_any() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!(origin = %origin, "CORS: ignoring invalid origin");
                None
            })
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
