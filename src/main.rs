use std::sync::Arc;

use resq_dispatch::config::AppConfig;
use resq_dispatch::engine::{DispatchEngine, DispatchPolicy};
use resq_dispatch::kafka;
use resq_dispatch::location::Geocoder;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting ResQ Dispatch Service...");

    // Build the dispatch engine
    let policy = DispatchPolicy {
        max_concurrent_ops: config.dispatch_max_concurrent_ops,
        force_assign_ratio: config.dispatch_force_assign_ratio,
    };
    let engine = Arc::new(tokio::sync::Mutex::new(DispatchEngine::new(policy)));
    info!(
        "Dispatch policy: cap {} concurrent ops, force-assign ratio {}",
        policy.max_concurrent_ops, policy.force_assign_ratio
    );

    let geocoder = Geocoder::from_config(&config);

    // Start consuming the event stream
    kafka::start_kafka_consumer(&config, engine, geocoder).await?;

    Ok(())
}
