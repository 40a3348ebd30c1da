//! MQTT connection loop
//!
//! Holds the broker session: subscribes on connect, routes publishes into
//! the engine, and flips the connectivity flag that the stats snapshot
//! reports. rumqttc reconnects on its own; we just pace the retries.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::ingest::{self, SUBSCRIPTIONS};
use crate::engine::Engine;

const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// Connect and pump the event loop until the task is aborted.
pub async fn run(config: Config, engine: Arc<Engine>) {
    let client_id = format!("motorwatch-{}", Uuid::new_v4().simple());
    let mut options = MqttOptions::new(client_id, &config.mqtt_broker, config.mqtt_port);
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(user), Some(pass)) = (&config.mqtt_username, &config.mqtt_password) {
        options.set_credentials(user, pass);
    }

    let (client, mut event_loop) = AsyncClient::new(options, 64);
    log::info!(
        "connecting to broker {}:{}",
        config.mqtt_broker,
        config.mqtt_port
    );

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                engine.stats().set_broker_online(true);
                log::info!("broker connected");
                for topic in SUBSCRIPTIONS {
                    match client.subscribe(topic, QoS::AtLeastOnce).await {
                        Ok(()) => log::info!("subscribed to {}", topic),
                        Err(err) => log::error!("subscribe {} failed: {}", topic, err),
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match ingest::parse_message(&publish.topic, &publish.payload) {
                    Ok(message) => {
                        if let Err(err) = engine.handle_broker_message(message).await {
                            log::warn!("message on {} rejected: {}", publish.topic, err);
                        }
                    }
                    Err(err) => {
                        log::warn!("dropping message on {}: {}", publish.topic, err);
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                engine.stats().set_broker_online(false);
                log::error!("broker connection lost: {}", err);
                tokio::time::sleep(RECONNECT_PAUSE).await;
            }
        }
    }
}
