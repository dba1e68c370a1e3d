use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::api::{
    handler::{account, analysis, auth, health},
    middleware::{handle_panic, not_found, require_auth},
    state::GatewayAppState,
};

/// Every route of the gateway with its terminal handlers attached.
///
/// Transport concerns (tracing, CORS, rate limiting, docs) are layered on by the binary.
pub fn build_router(state: Arc<GatewayAppState>) -> Router {
    let auth_routes = Router::new()
        .route("/signin", post(auth::sign_in))
        .route("/signup", post(auth::sign_up))
        .route("/signout", post(auth::sign_out));

    let account_routes = Router::new()
        .route("/profile", get(account::profile))
        .route("/projects", get(account::projects))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/ping", get(health::ping))
        .nest("/api/auth", auth_routes)
        .nest("/api/my", account_routes)
        .route("/api/analyze", post(analysis::analyze))
        .route("/api/general-details", get(analysis::general_details))
        .route("/api/histogram", get(analysis::histogram))
        .route("/api/questions", get(analysis::questions))
        .route("/api/question", get(analysis::question))
        .route("/api/options", get(analysis::options))
        .route("/api/option", get(analysis::option))
        .route("/api/students", get(analysis::students))
        .route("/api/student", get(analysis::student))
        .route("/api/rasch", get(analysis::rasch))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// CORS policy for the browser front-ends. Credentials are allowed, so origins
/// must be listed explicitly.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
