mod buffer;
mod consumer;
mod error;

use blog_config::Settings;
use consumer::BatchConsumer;
use log::info;
use miette::IntoDiagnostic;
use tokio_util::sync::CancellationToken;

use crate::buffer::FlushThresholds;

#[tokio::main]
async fn main() -> miette::Result<()> {
    env_logger::init();

    let settings = Settings::load().into_diagnostic()?;

    let bus = blog_bus::StreamBus::connect(&settings.redis_url).into_diagnostic()?;

    let store = blog_store::pool::connect(
        &settings.mysql_dsn(),
        settings.mysql_pool_size,
        settings.mysql_max_overflow,
    )
    .await
    .into_diagnostic()?;
    blog_store::pool::run_migrations(&store).await.into_diagnostic()?;

    let consumer_name = settings.consumer_name.clone().unwrap_or_else(default_consumer_name);
    info!(
        "starting batch consumer {consumer_name} in group {}",
        settings.consumer_group
    );

    let thresholds = FlushThresholds {
        max_count: settings.batch_max_count,
        max_age_ms: settings.batch_max_age_ms,
        max_bytes: settings.batch_max_bytes,
    };

    let shutdown = CancellationToken::new();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        ctrl_c_shutdown.cancel();
    });

    let consumer = BatchConsumer::new(bus, store, settings.consumer_group, consumer_name, thresholds);
    consumer.run(shutdown).await;

    Ok(())
}

fn default_consumer_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{host}-{}", std::process::id())
}
