use std::sync::Arc;

use pass_proxy::aggregate::Aggregator;
use pass_proxy::config::Config;
use pass_proxy::security::RequestGate;
use pass_proxy::service::PassService;
use pass_proxy::upstream::RobloxClient;
use pass_proxy::{Server, api};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!(
        port = config.port,
        games = %config.games_url,
        thumbnails = %config.thumbnails_url,
        timeout = ?config.upstream_timeout,
        "starting pass-proxy"
    );

    let upstream = Arc::new(RobloxClient::new(&config)?);
    let service = Arc::new(PassService::new(Aggregator::new(upstream)));
    let app = api::app(service, Arc::new(RequestGate::default()));

    let server = Server::bind(config.bind_addr()).await?;
    server
        .run_until(
            move |req| {
                let app = app.clone();
                async move { app.handle(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;

    info!("pass-proxy stopped");
    Ok(())
}
