//! Event Fan-out
//!
//! Typed broadcast of pipeline events to all connected subscribers over a
//! `tokio::sync::broadcast` channel. The bus is injected into the engine;
//! there is no ambient global handle. Delivery is best-effort with no
//! per-subscriber acknowledgment, and each event is emitted at most once
//! per successful write.

use serde::Serialize;
use tokio::sync::broadcast;

use super::stats::StatsSnapshot;
use super::types::{AnomalyRecord, MachineStatus, PredictionRecord, SensorReading};

/// Default channel capacity; slow subscribers lag rather than block the
/// pipeline.
const DEFAULT_CAPACITY: usize = 256;

/// Everything the engine broadcasts. Wire names match what the dashboard
/// already listens for.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum EngineEvent {
    #[serde(rename = "rawSensorData")]
    RawSensorData(SensorReading),
    #[serde(rename = "new-anomaly")]
    NewAnomaly {
        motor_id: String,
        anomaly: AnomalyRecord,
    },
    #[serde(rename = "new-prediction")]
    NewPrediction(PredictionRecord),
    #[serde(rename = "motor-status")]
    MotorStatusChanged {
        machine_id: String,
        status: MachineStatus,
    },
    #[serde(rename = "metricsUpdate")]
    MetricsUpdated {
        machine_id: String,
        metrics: serde_json::Value,
    },
    #[serde(rename = "device-connected")]
    DeviceConnected { device_id: String },
    #[serde(rename = "device-status-update")]
    DeviceStatusChanged {
        machine_id: String,
        status: String,
        timestamp: Option<String>,
    },
    #[serde(rename = "stats")]
    Stats(StatsSnapshot),
    #[serde(rename = "dataError")]
    DataError {
        kind: String,
        machine_id: String,
        error: String,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::RawSensorData(_) => "rawSensorData",
            EngineEvent::NewAnomaly { .. } => "new-anomaly",
            EngineEvent::NewPrediction(_) => "new-prediction",
            EngineEvent::MotorStatusChanged { .. } => "motor-status",
            EngineEvent::MetricsUpdated { .. } => "metricsUpdate",
            EngineEvent::DeviceConnected { .. } => "device-connected",
            EngineEvent::DeviceStatusChanged { .. } => "device-status-update",
            EngineEvent::Stats(_) => "stats",
            EngineEvent::DataError { .. } => "dataError",
        }
    }
}

/// Broadcast handle shared between the engine and its subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit to all current subscribers. An empty audience is not an error.
    pub fn emit(&self, event: EngineEvent) {
        log::debug!("emit {}", event.name());
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
