//! Broker ingestion boundary
//!
//! Parses `(topic, payload)` pairs from the message broker into typed
//! messages exactly once, at the edge. Topics carry the machine id in
//! their second path segment; payloads are JSON. Anything unknown or
//! malformed is an `IngestError` the caller logs and drops.

use serde::Deserialize;
use thiserror::Error;

use super::types::RawReading;
use super::types::{AlertDetails, Severity};

/// Topic filters the engine subscribes to.
pub const SUBSCRIPTIONS: [&str; 4] = [
    "sensor/+/data",
    "prediction/+/alert",
    "metrics/+/update",
    "device/+/status",
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("malformed topic: {0}")]
    MalformedTopic(String),
    #[error("malformed payload on {topic}: {source}")]
    Payload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Alert payload as published on `prediction/{id}/alert`. The machine id
/// comes from the topic, not the body.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertPayload {
    #[serde(rename = "type")]
    pub prediction_type: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub details: AlertDetails,
}

/// Payload on `device/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceStatusPayload {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One broker message, parsed and tagged by kind.
#[derive(Debug)]
pub enum BrokerMessage {
    SensorData {
        machine_id: String,
        reading: RawReading,
    },
    PredictionAlert {
        machine_id: String,
        alert: AlertPayload,
    },
    MetricsUpdate {
        machine_id: String,
        metrics: serde_json::Map<String, serde_json::Value>,
    },
    DeviceStatus {
        machine_id: String,
        status: DeviceStatusPayload,
    },
}

impl BrokerMessage {
    pub fn machine_id(&self) -> &str {
        match self {
            BrokerMessage::SensorData { machine_id, .. }
            | BrokerMessage::PredictionAlert { machine_id, .. }
            | BrokerMessage::MetricsUpdate { machine_id, .. }
            | BrokerMessage::DeviceStatus { machine_id, .. } => machine_id,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(topic: &str, payload: &[u8]) -> Result<T, IngestError> {
    serde_json::from_slice(payload).map_err(|source| IngestError::Payload {
        topic: topic.to_string(),
        source,
    })
}

/// Parse one broker delivery into a typed message.
pub fn parse_message(topic: &str, payload: &[u8]) -> Result<BrokerMessage, IngestError> {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() != 3 {
        return Err(IngestError::MalformedTopic(topic.to_string()));
    }
    let machine_id = segments[1];
    if machine_id.is_empty() {
        return Err(IngestError::MalformedTopic(topic.to_string()));
    }
    let machine_id = machine_id.to_string();

    match (segments[0], segments[2]) {
        ("sensor", "data") => {
            let mut reading: RawReading = decode(topic, payload)?;
            // topic wins over whatever the payload claims
            reading.machine_id = Some(machine_id.clone());
            Ok(BrokerMessage::SensorData {
                machine_id,
                reading,
            })
        }
        ("prediction", "alert") => Ok(BrokerMessage::PredictionAlert {
            machine_id,
            alert: decode(topic, payload)?,
        }),
        ("metrics", "update") => Ok(BrokerMessage::MetricsUpdate {
            machine_id,
            metrics: decode(topic, payload)?,
        }),
        ("device", "status") => Ok(BrokerMessage::DeviceStatus {
            machine_id,
            status: decode(topic, payload)?,
        }),
        _ => Err(IngestError::UnknownTopic(topic.to_string())),
    }
}
