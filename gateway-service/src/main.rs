use std::{env, net::SocketAddr, sync::Arc};

use gateway_service::{
    api::{
        handler::{account, analysis, auth, health},
        middleware::rate_limited,
        router::{build_router, cors_layer},
        state::GatewayAppState,
    },
    config::GatewayConfig,
    infrastructure::{
        analytics::HttpAnalyticsClient, auth::SupabaseAuthClient, rest::SupabaseRestClient,
        supabase::SupabaseClient,
    },
};
use tokio::net::TcpListener;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::ping,
        auth::sign_in,
        auth::sign_up,
        auth::sign_out,
        account::profile,
        account::projects,
        analysis::analyze,
        analysis::general_details,
        analysis::histogram,
        analysis::questions,
        analysis::question,
        analysis::options,
        analysis::option,
        analysis::students,
        analysis::student,
        analysis::rasch,
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Auth", description = "Sign in, sign up and sign out"),
        (name = "Account", description = "The signed in user's profile and projects"),
        (name = "Analysis", description = "Upload answer sheets and read stored analyses"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    let _guard = shared::telemetry::init_telemetry("gateway-service");

    let config_path =
        env::var("GATEWAY_CONFIG_PATH").unwrap_or_else(|_| "gateway.toml".to_string());
    let config = GatewayConfig::load(&config_path).expect("Failed to load gateway config");
    tracing::debug!(?config, "Resolved configuration");

    let supabase = SupabaseClient::new(
        config.supabase_url.clone(),
        config.supabase_anon_key.clone(),
    );
    let rest = Arc::new(SupabaseRestClient::new(supabase.clone()));

    let state = Arc::new(GatewayAppState {
        identity: Arc::new(SupabaseAuthClient::new(supabase)),
        projects: rest.clone(),
        analysis: rest,
        analytics: Arc::new(HttpAnalyticsClient::new(
            config.analytics_url.clone(),
            config.analytics_timeout,
        )),
        credential_transport: config.credential_transport.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(20)
        .key_extractor(SmartIpKeyExtractor)
        .use_headers()
        .finish()
        .expect("Failed to build governor config");

    let app = build_router(state)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Rate limiting (per-IP, 2 req/s with burst of 20)
        .layer(GovernorLayer::new(governor_conf).error_handler(rate_limited))
        .layer(cors_layer(&config.allowed_origins))
        // tracing log (turn request into info level)
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        );

    let port = config.port;
    tracing::info!("gateway-service listening on 0.0.0.0:{port}");

    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("Failed to bind");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shared::shutdown::shutdown_signal())
    .await
    .expect("Server crashed");

    tracing::info!("gateway-service shut down");
}
