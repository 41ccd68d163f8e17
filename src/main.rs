use vantage::VantageError;
use vantage::config::fetch_config;
use vantage::server::run_server;

#[tokio::main]
async fn main() -> Result<(), VantageError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vantage=info,tower_http=info".into()),
        )
        .init();

    let app_config = fetch_config()?;
    run_server(app_config).await
}
