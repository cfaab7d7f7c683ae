use carbot_relay::init::app_init;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("🚀 Starting CarBot relay...");

    let (config, app) = app_init()?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("");
    log::info!("🎉 Server started!");
    log::info!("📍 http://{}", addr);
    log::info!("📡 Chat: http://{}/api/chat", addr);
    log::info!("❤️  Health: http://{}/api/health", addr);
    log::info!("");
    log::info!("🤖 Model: {}", config.gemini.model);
    log::info!("🔎 Google Search grounding: {}", config.gemini.google_search);
    log::info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("👋 Shutting down");
}
