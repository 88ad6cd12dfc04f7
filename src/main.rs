use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = offers_api::config::config();
    tracing::info!("Starting offers API in {:?} mode", config.environment);

    offers_api::database::init().await?;

    let app = offers_api::handlers::router();

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Offers API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
