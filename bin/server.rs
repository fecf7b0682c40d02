// Purchase Analytics - Web Server
// REST API with Axum over the configured purchase source

use std::sync::Arc;

use anyhow::Context;
use purchase_analytics::api::{router, AppState};
use purchase_analytics::{init_logging, AppConfig, PurchaseAnalytics, PurchaseRepository};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;
    let repository = config.build_repository()?;
    info!(source = %repository.source_type(), "🌐 Purchase Analytics - Web Server");

    let state = Arc::new(AppState {
        analytics: PurchaseAnalytics::new(repository),
    });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("🚀 Server running on http://{}", config.bind_addr);
    info!("   API: http://{}/api/purchases/most_spending", config.bind_addr);

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
