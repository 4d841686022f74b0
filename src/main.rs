use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use tokscrape::config::AppConfig;
use tokscrape::logging::LogContext;
use tokscrape::{log_info, TokScrape};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load().await?;
    config.ensure_directories().await?;

    // Initialize logging
    tokscrape::logging::init_logging(&config.logging)?;

    let context = LogContext::new("main", "startup");
    log_info!(context, version = env!("CARGO_PKG_VERSION"), "TokScrape starting up");

    // Initialize the core application
    let app = Arc::new(TokScrape::new(config)?);
    info!("Core application initialized");

    serve(app).await?;

    info!("TokScrape shutting down");
    Ok(())
}

#[cfg(feature = "api")]
async fn serve(app: Arc<TokScrape>) -> Result<()> {
    use actix_web::{web, App, HttpServer};

    let bind = (app.config().api.host.clone(), app.config().api.port);
    info!("Starting HTTP server on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app.clone()))
            .configure(tokscrape::api::configure_routes)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

#[cfg(not(feature = "api"))]
async fn serve(_app: Arc<TokScrape>) -> Result<()> {
    tracing::warn!("API feature not enabled, use tokscrape-cli to run a scrape in the foreground");
    Ok(())
}
