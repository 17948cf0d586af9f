//! services/companion/src/bin/companion.rs

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use companion_lib::{
    adapters::{
        BackendClient, DbAdapter, RestBillingAdapter, RestNotesAdapter, RestProcessingAdapter,
        RestQuestionAdapter,
    },
    auth::AuthContext,
    config::Config,
    error::ApiError,
    web::{
        billing, middleware::USER_ID_HEADER, require_auth,
        rest::{self, ApiDoc},
        state::{AppState, SessionRegistry},
        study, ws_handler,
    },
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting companion...");

    // --- 2. Connect to the Hosted Database ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    db_adapter.ping().await?;
    info!("Database connection verified.");

    // --- 3. Initialize the Auth Context & Backend Adapters ---
    let auth = AuthContext::new();
    auth.init(&config);

    let backend = BackendClient::new(config.api_base_url.clone(), auth.clone(), config.http_timeout)?;
    let processing = Arc::new(RestProcessingAdapter::new(backend.clone()));
    let questions = Arc::new(RestQuestionAdapter::new(backend.clone()));
    let notes = Arc::new(RestNotesAdapter::new(backend.clone()));
    let billing_adapter = Arc::new(RestBillingAdapter::new(backend));
    info!("Backend adapters ready for {}", config.api_base_url);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        processing,
        questions,
        notes,
        billing: billing_adapter,
        config: config.clone(),
        auth: auth.clone(),
        sessions: Arc::new(SessionRegistry::default()),
    });

    // --- 5. Create the Web Router ---
    let origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid ALLOWED_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT, HeaderName::from_static(USER_ID_HEADER)]);

    let protected_routes = Router::new()
        .route("/sessions", post(rest::create_session_handler))
        .route("/ws", get(ws_handler))
        .route("/projects", get(rest::list_projects_handler).post(rest::create_project_handler))
        .route("/projects/events", get(rest::project_events_handler))
        .route("/projects/{project_id}", delete(rest::delete_project_handler))
        .route(
            "/projects/{project_id}/videos",
            get(rest::list_videos_handler).post(rest::add_video_handler),
        )
        .route("/activity", get(rest::list_activity_handler))
        .route("/videos/{video_id}/status", get(study::video_status_handler))
        .route("/videos/{video_id}/quiz", post(study::generate_quiz_handler))
        .route("/videos/{video_id}/quiz/submit", post(study::submit_quiz_handler))
        .route(
            "/videos/{video_id}/notes",
            get(study::get_notes_handler).post(study::generate_notes_handler),
        )
        .route("/videos/{video_id}/notes/{note_id}", put(study::update_notes_handler))
        .route("/billing/plans", get(billing::list_plans_handler))
        .route("/billing/subscribe", post(billing::subscribe_handler))
        .route("/credits/packages", get(billing::list_packages_handler))
        .route("/credits/purchase", post(billing::purchase_package_handler))
        .route("/credits/purchase-custom", post(billing::purchase_custom_handler))
        .route("/credits/history", get(billing::credit_history_handler))
        .route("/credits/balance", get(billing::credit_balance_handler))
        .layer(axum_middleware::from_fn(require_auth));

    let api_router = Router::new()
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 7. Tear Down ---
    auth.teardown();
    info!("Companion stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}
