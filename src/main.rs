use smcscan::application::system::Application;
use smcscan::config::Config;
use smcscan::domain::errors::CandleSourceError;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG: i32 = 64;
const EXIT_AUTH: i32 = 69;
const EXIT_INTERNAL: i32 = 70;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(EXIT_CONFIG);
        }
    };

    info!(
        "Starting smcscan: {} symbols, {} timeframes, scan every {}s",
        config.symbols.len(),
        config.timeframes.len(),
        config.scan_interval_seconds
    );

    let app = match Application::build(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {e:#}");
            std::process::exit(exit_code_for(&e));
        }
    };

    if let Err(e) = app.run().await {
        error!("Fatal: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<CandleSourceError>() {
        Some(e) if e.is_auth() => EXIT_AUTH,
        _ => EXIT_INTERNAL,
    }
}
