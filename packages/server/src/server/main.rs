// Main entry point for the HireFlow orchestrator

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hireflow_core::domains::automation::{BackgroundCycler, MetricsStore, MetricsThresholds};
use hireflow_core::domains::interviews::ActionTokenService;
use hireflow_core::kernel::{
    EngineSettings, HttpCalendarProvider, HttpEmailService, HttpLlmService, HttpRiskService,
    HttpScoringService, ServerDeps,
};
use hireflow_core::server::build_app;
use hireflow_core::server::middleware::SessionJwt;
use hireflow_core::storage::PostgresStorage;
use hireflow_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hireflow_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting HireFlow interview orchestrator");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // External collaborators
    let email = Arc::new(HttpEmailService::new(
        config.email_service_url.clone(),
        config.email_timeout,
    )?);
    let calendar = Arc::new(HttpCalendarProvider::new(
        config.calendar_service_url.clone(),
        config.calendar_timeout,
    )?);
    let risk = Arc::new(HttpRiskService::new(
        config.risk_service_url.clone(),
        config.risk_timeout,
    )?);
    let scoring = Arc::new(HttpScoringService::new(
        config.scoring_service_url.clone(),
        config.scoring_timeout,
    )?);
    let llm = match &config.llm_service_url {
        Some(url) => Some(Arc::new(HttpLlmService::new(url.clone(), config.llm_timeout)?)
            as Arc<dyn hireflow_core::kernel::BaseLlmService>),
        None => {
            tracing::info!("LLM_SERVICE_URL not set, negotiation runs rule-based only");
            None
        }
    };

    let settings = EngineSettings {
        confirmation_deadline: chrono::Duration::hours(config.confirmation_deadline_hours),
        slot_selection_deadline: chrono::Duration::hours(config.slot_selection_deadline_hours),
        frontend_base_url: config.frontend_base_url.clone(),
        default_buffer_target: config.default_buffer_target,
    };

    let deps = Arc::new(ServerDeps::new(
        Arc::new(PostgresStorage::new(pool.clone())),
        email,
        calendar,
        risk,
        scoring,
        llm,
        ActionTokenService::new(&config.token_signing_secret),
        Arc::new(MetricsStore::new(MetricsThresholds::default())),
        settings,
    ));

    // Background cycler
    let cycler = Arc::new(BackgroundCycler::new(deps.clone(), config.cycle_period));
    let scheduler = cycler.start().await.context("Failed to start cycler")?;

    // HTTP server
    let jwt = Arc::new(SessionJwt::new(&config.jwt_secret, config.jwt_issuer.clone()));
    let app = build_app(deps, jwt);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let shutdown_cycler = cycler.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    // Let any in-flight cycle finish before the process exits
    shutdown_cycler.shutdown(scheduler).await;
    tracing::info!("Shutdown complete");

    Ok(())
}
