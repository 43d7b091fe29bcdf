//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        db::SqlxReadingRepository, export::HtmlReportRenderer, export::HttpBlobStore,
        interpreter::OpenAiInterpreterAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        draw_handler, export_handler, get_reading_handler, history_handler,
        middleware::require_identity, rest::ApiDoc, save_handler, state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tarot_journal_core::catalog::Catalog;
use tower_http::cors::CorsLayer;
use tracing::info;
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
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let repository = Arc::new(SqlxReadingRepository::new(db_pool.clone()));
    info!("Running database migrations...");
    repository.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let interpreter = Arc::new(OpenAiInterpreterAdapter::new(
        openai_client,
        config.interpreter_model.clone(),
    ));
    let renderer = Arc::new(HtmlReportRenderer);
    let blobs = Arc::new(HttpBlobStore::new(
        reqwest::Client::new(),
        config.blob_store_url.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let catalog = Arc::new(Catalog::standard());
    info!("Card catalog loaded with {} cards.", catalog.len());
    let app_state = Arc::new(AppState::new(
        config.clone(),
        catalog,
        repository,
        interpreter,
        renderer,
        blobs,
    ));

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .client_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CLIENT_ORIGIN: {e}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // All reading routes require an identity; the auth service in front of
    // this API populates the x-user-id header.
    let api_router = Router::new()
        .route("/readings/draw", post(draw_handler))
        .route("/readings/save", post(save_handler))
        .route("/readings/export", post(export_handler))
        .route("/readings/history", get(history_handler))
        .route("/readings/{id}", get(get_reading_handler))
        .layer(axum_middleware::from_fn(require_identity))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
