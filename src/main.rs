use axum::{Router, routing::get};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coinpulse_backend::AppState;
use coinpulse_backend::handlers;
use coinpulse_backend::jobs::price_sample_sync::start_price_sample_job;
use coinpulse_backend::services::coinmarketcap::CoinMarketCapService;
use coinpulse_backend::services::historical_data::HistoricalDataService;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,coinpulse_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Market-data client for ingestion and fallback price lookups
    let api_key = env::var("CMC_API_KEY").unwrap_or_default();
    let base_url = env::var("CMC_BASE_URL")
        .unwrap_or_else(|_| "https://pro-api.coinmarketcap.com".to_string());
    let market_data = CoinMarketCapService::new(api_key, base_url);

    let historical = HistoricalDataService::new(db, market_data);

    // Background ingestion, decoupled from the read path
    start_price_sample_job(historical.clone()).await;

    let state = AppState { historical };

    // Build router
    let app = Router::new()
        .route("/", get(health))
        .route(
            "/api/cryptocurrencies/{id}/historical",
            get(handlers::historical::get_historical_data),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.expect("Server error");
}

async fn health() -> &'static str {
    "OK"
}
