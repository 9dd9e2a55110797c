use bosan_cloud::{AppState, BoxError, Config, api};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bosan_cloud=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting bosan-cloud (env: {})", config.environment);

    let state = AppState::new(&config).await?;

    let app = api::router(state);

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("bosan-cloud HTTP listening on {http_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
