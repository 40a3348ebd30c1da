//! MotorWatch server entry point
//!
//! Wires the pieces together: config, store, engine, MQTT loop and the
//! periodic stats broadcast, then waits for Ctrl-C and gives in-flight
//! work a grace period before exiting.

use std::process;
use std::sync::Arc;

use anyhow::Context;

use motorwatch::broker;
use motorwatch::config::Config;
use motorwatch::engine::Engine;
use motorwatch::store::{DataStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    log::info!(
        "MotorWatch starting (broker {}:{})",
        config.mqtt_broker,
        config.mqtt_port
    );

    let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
    store
        .ping()
        .await
        .context("data store is not reachable")?;

    let engine = Arc::new(Engine::new(
        Arc::clone(&store),
        config.default_thresholds,
    ));

    let stats_engine = Arc::clone(&engine);
    let stats_interval = config.stats_interval;
    let stats_task = tokio::spawn(async move {
        stats_engine.run_stats_timer(stats_interval).await;
    });

    let shutdown_grace = config.shutdown_grace;
    let broker_engine = Arc::clone(&engine);
    let broker_task = tokio::spawn(broker::run(config, broker_engine));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log::info!("shutdown requested, draining in-flight work");

    broker_task.abort();
    stats_task.abort();

    let drain = async {
        let _ = broker_task.await;
        let _ = stats_task.await;
    };
    if tokio::time::timeout(shutdown_grace, drain).await.is_err() {
        log::error!("grace period elapsed, forcing exit");
        process::exit(1);
    }

    log::info!(
        "stopped cleanly: {} events processed, {} anomalies detected",
        engine.stats().total_events(),
        engine.stats().anomalies_detected()
    );
    Ok(())
}
