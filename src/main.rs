use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use translation_bundles::config::Config;
use translation_bundles::db::Database;
use translation_bundles::server::{router, AppState};
use translation_bundles::{SystemClock, TranslationService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_bundles=info".parse()?),
        )
        .init();

    info!("Starting translation bundle service");

    let config = Config::from_env()?;
    if config.api_key.is_none() {
        info!("API_KEY not set, admin routes are disabled");
    }

    let db = Arc::new(Database::new(&config.database_url).await?);
    let service = TranslationService::new(
        config.translations.clone(),
        db.clone(),
        db.clone(),
        db,
        Arc::new(SystemClock),
    );

    let app = router(AppState::new(service.clone(), config.api_key.clone()));
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    if config.publish_on_startup {
        let publisher = service.clone();
        tokio::spawn(async move {
            match publisher.publish_all_translations().await {
                Ok(report) => info!(
                    "Startup publish: {} keys registered, {} bundles warmed",
                    report.registered,
                    report.warmed.len()
                ),
                Err(e) => error!("Startup publish failed: {}", e),
            }
        });
    }

    info!("Listening on {} ({})", addr, config.environment);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
