use cid_server::{CidServer, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cid_server=debug,cid_prober=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        vendor = %config.prober.vendor_domain,
        concurrency = config.prober.concurrency_limit,
        batch_delay_ms = config.prober.batch_delay.as_millis() as u64,
        "Loaded configuration"
    );

    let server = CidServer::new(config)?;
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e);
    }

    tracing::info!("Shut down gracefully");
    Ok(())
}
