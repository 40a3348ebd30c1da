//! Event-processing pipeline
//!
//! Owns the full path from a broker message to persisted records and
//! broadcast events: validate/sanitize, persist the raw reading, fold
//! into the baseline, classify, persist prediction/anomaly/status with
//! per-step retry, and fan out. All state is injected and instance-owned
//! so tests can build isolated engines.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::store::{DataStore, StoreError};

use super::baseline::{Baseline, BaselineTracker};
use super::classifier;
use super::events::{EngineEvent, EventBus};
use super::ingest::BrokerMessage;
use super::registry::DeviceRegistry;
use super::retry::{execute_with_retry, RetryPolicy};
use super::sanitize::{self, sanitize_numeric, TEMP_SOUND_PRECISION};
use super::stats::{RuntimeStats, StatsSnapshot};
use super::threshold::{ThresholdOverride, ThresholdSet, ThresholdStore};
use super::types::{
    anomaly_category, now_rfc3339, AnomalyEvent, AnomalyRecord, MachineStatus, MotorState,
    PredictionAlert, PredictionRecord, RawReading, SensorReading,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Engine {
    store: Arc<dyn DataStore>,
    bus: EventBus,
    stats: Arc<RuntimeStats>,
    registry: DeviceRegistry,
    thresholds: Arc<ThresholdStore>,
    baselines: BaselineTracker,
    retry: RetryPolicy,
}

impl Engine {
    pub fn new(store: Arc<dyn DataStore>, default_thresholds: ThresholdSet) -> Self {
        let thresholds = Arc::new(ThresholdStore::new(default_thresholds));
        Self {
            store,
            bus: EventBus::default(),
            stats: Arc::new(RuntimeStats::new()),
            registry: DeviceRegistry::new(),
            thresholds: Arc::clone(&thresholds),
            baselines: BaselineTracker::new(thresholds),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy (shorter delays in tests).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Attach a subscriber. New subscribers get a stats snapshot right
    /// away, same as the periodic broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        let rx = self.bus.subscribe();
        self.broadcast_stats();
        rx
    }

    // ------------------------------------------------------------------
    // Operator threshold API
    // ------------------------------------------------------------------

    pub fn thresholds_for(&self, machine_id: &str) -> ThresholdSet {
        self.thresholds.get_or_init(machine_id)
    }

    pub fn baseline_for(&self, machine_id: &str) -> Option<Baseline> {
        self.baselines.get(machine_id)
    }

    pub fn override_thresholds(
        &self,
        machine_id: &str,
        patch: ThresholdOverride,
    ) -> ThresholdSet {
        self.thresholds.apply_override(machine_id, patch)
    }

    // ------------------------------------------------------------------
    // Broker entrypoint
    // ------------------------------------------------------------------

    /// Dispatch a parsed broker message. A sensor-data message also marks
    /// its machine online.
    pub async fn handle_broker_message(&self, message: BrokerMessage) -> Result<(), EngineError> {
        self.stats.inc_mqtt_messages();

        match message {
            BrokerMessage::SensorData {
                machine_id,
                reading,
            } => {
                self.register_device(&machine_id);
                self.handle_raw_reading(reading).await?;
            }
            BrokerMessage::PredictionAlert { machine_id, alert } => {
                self.handle_prediction_alert(PredictionAlert {
                    machine_id,
                    prediction_type: alert.prediction_type,
                    severity: alert.severity,
                    message: alert.message,
                    timestamp: alert.timestamp,
                    details: alert.details,
                })
                .await?;
            }
            BrokerMessage::MetricsUpdate {
                machine_id,
                metrics,
            } => {
                self.handle_metrics_update(&machine_id, metrics).await;
            }
            BrokerMessage::DeviceStatus { machine_id, status } => {
                self.handle_device_status(&machine_id, &status.status, status.timestamp);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw readings
    // ------------------------------------------------------------------

    /// Ingest one raw reading. Validation failures abort this reading only
    /// and surface to the caller; persistence failures are absorbed here
    /// (counter + `dataError`) and the pipeline moves on.
    pub async fn handle_raw_reading(
        &self,
        raw: RawReading,
    ) -> Result<Option<SensorReading>, EngineError> {
        self.stats.inc_total_events();

        let errors = sanitize::validate(&raw);
        if !errors.is_empty() {
            return Err(EngineError::Validation(sanitize::join_errors(&errors)));
        }
        let reading = sanitize::sanitize(&raw);

        let inserted = execute_with_retry(&self.retry, "insert raw sensor reading", || {
            self.store.insert_raw_reading(&reading)
        })
        .await;

        if let Err(err) = inserted {
            self.stats.inc_failed_inserts();
            log::error!(
                "raw reading for {} not persisted: {}",
                reading.machine_id,
                err
            );
            self.bus.emit(EngineEvent::DataError {
                kind: "sensor_data".to_string(),
                machine_id: reading.machine_id.clone(),
                error: err.redacted().to_string(),
            });
            return Ok(None);
        }

        self.stats.inc_successful_inserts();
        self.bus.emit(EngineEvent::RawSensorData(reading.clone()));
        log::debug!(
            "raw reading saved: {} temp={:?}",
            reading.machine_id,
            reading.temperature_c
        );

        self.update_derived_metrics(&reading).await;

        if let Some(event) = self.analyze_reading(&reading) {
            log::info!("{} detected on {}", event.kind.label(), event.machine_id);
            self.handle_prediction_alert(event.into_alert()).await?;
        }

        Ok(Some(reading))
    }

    /// Baseline update plus classification for one persisted reading.
    /// Thresholds and baseline are snapshotted first, so an adaptation
    /// triggered by this sample only affects the next one.
    fn analyze_reading(&self, reading: &SensorReading) -> Option<AnomalyEvent> {
        let thresholds = self.thresholds.get_or_init(&reading.machine_id);
        let baseline = self.baselines.get(&reading.machine_id).unwrap_or_default();
        let magnitude = classifier::vibration_magnitude(reading);

        self.baselines
            .update(&reading.machine_id, reading.temperature_c, magnitude);

        classifier::classify(reading, &thresholds, &baseline, &self.stats)
    }

    /// Live per-machine metrics derived from every persisted reading.
    async fn update_derived_metrics(&self, reading: &SensorReading) {
        let metrics = serde_json::json!({
            "vibration_current": classifier::vibration_magnitude(reading),
            "temperature_current": reading.temperature_c.unwrap_or(0.0),
            "sound_current": reading.sound_amplitude.unwrap_or(0.0),
            "last_updated": now_rfc3339(),
        });

        let result = execute_with_retry(&self.retry, "update machine metrics", || {
            self.store.update_machine_metrics(&reading.machine_id, &metrics)
        })
        .await;

        match result {
            Ok(()) => self.bus.emit(EngineEvent::MetricsUpdated {
                machine_id: reading.machine_id.clone(),
                metrics,
            }),
            Err(err) => {
                self.stats.inc_failed_inserts();
                log::error!("metrics for {} not updated: {}", reading.machine_id, err);
                self.bus.emit(EngineEvent::DataError {
                    kind: "metrics".to_string(),
                    machine_id: reading.machine_id.clone(),
                    error: err.redacted().to_string(),
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Prediction alerts
    // ------------------------------------------------------------------

    /// Run the prediction write sequence: prediction record, anomaly
    /// record (unless `Normal`), machine status, then broadcasts. Each
    /// store step retries independently; a failed step is absorbed and
    /// later steps still run, so a prediction can outlive a lost anomaly.
    pub async fn handle_prediction_alert(&self, alert: PredictionAlert) -> Result<(), EngineError> {
        let confidence = sanitize_numeric(
            alert.details.xgb_confidence.or(alert.details.confidence),
            TEMP_SOUND_PRECISION,
        );
        self.validate_alert(&alert, confidence)?;

        let timestamp = alert.timestamp.clone().unwrap_or_else(now_rfc3339);
        let is_normal = alert.prediction_type == "Normal";

        let prediction = PredictionRecord {
            id: Uuid::new_v4(),
            machine_id: alert.machine_id.clone(),
            prediction_type: alert.prediction_type.clone(),
            confidence,
            severity: alert.severity,
            timestamp: timestamp.clone(),
            xgb_prediction: Some(alert.prediction_type.clone()),
            xgb_confidence: sanitize_numeric(alert.details.xgb_confidence, TEMP_SOUND_PRECISION),
            dl_prediction: Some(alert.prediction_type.clone()),
            dl_confidence: sanitize_numeric(alert.details.dl_confidence, TEMP_SOUND_PRECISION),
            raw_data_sample: alert.details.raw_data_sample.clone(),
        };

        let stored_prediction = match execute_with_retry(&self.retry, "insert prediction", || {
            self.store.insert_prediction(&prediction)
        })
        .await
        {
            Ok(stored) => Some(stored),
            Err(err) => {
                self.stats.inc_failed_inserts();
                log::error!(
                    "prediction for {} not persisted: {}",
                    alert.machine_id,
                    err
                );
                self.bus.emit(EngineEvent::DataError {
                    kind: "prediction".to_string(),
                    machine_id: alert.machine_id.clone(),
                    error: err.redacted().to_string(),
                });
                None
            }
        };

        if !is_normal {
            let anomaly = AnomalyRecord {
                id: Uuid::new_v4(),
                machine_id: alert.machine_id.clone(),
                category: anomaly_category(&alert.prediction_type).to_string(),
                severity: alert.severity,
                description: alert.message.clone(),
                detected_at: timestamp.clone(),
                prediction_confidence: confidence,
                ml_details: serde_json::to_value(&alert.details)
                    .unwrap_or(serde_json::Value::Null),
            };

            match execute_with_retry(&self.retry, "insert anomaly", || {
                self.store.insert_anomaly(&anomaly)
            })
            .await
            {
                Ok(stored) => self.bus.emit(EngineEvent::NewAnomaly {
                    motor_id: alert.machine_id.clone(),
                    anomaly: stored,
                }),
                Err(err) => {
                    self.stats.inc_failed_inserts();
                    log::error!("anomaly for {} not persisted: {}", alert.machine_id, err);
                    self.bus.emit(EngineEvent::DataError {
                        kind: "anomaly".to_string(),
                        machine_id: alert.machine_id.clone(),
                        error: err.redacted().to_string(),
                    });
                }
            }
        }

        let status = MachineStatus {
            status: if is_normal {
                MotorState::Running
            } else {
                MotorState::Maintenance
            },
            overall_severity: alert.severity,
            last_prediction: timestamp,
            last_updated: now_rfc3339(),
        };

        match execute_with_retry(&self.retry, "update machine status", || {
            self.store.update_machine_status(&alert.machine_id, &status)
        })
        .await
        {
            Ok(()) => self.bus.emit(EngineEvent::MotorStatusChanged {
                machine_id: alert.machine_id.clone(),
                status: status.clone(),
            }),
            Err(err) => {
                self.stats.inc_failed_inserts();
                log::error!("status for {} not updated: {}", alert.machine_id, err);
                self.bus.emit(EngineEvent::DataError {
                    kind: "status".to_string(),
                    machine_id: alert.machine_id.clone(),
                    error: err.redacted().to_string(),
                });
            }
        }

        if let Some(stored) = stored_prediction {
            self.bus.emit(EngineEvent::NewPrediction(stored));
        }

        log::info!(
            "prediction processed: {} - {} ({})",
            alert.machine_id,
            alert.prediction_type,
            alert.severity
        );
        Ok(())
    }

    fn validate_alert(
        &self,
        alert: &PredictionAlert,
        confidence: Option<f64>,
    ) -> Result<(), EngineError> {
        let mut errors = Vec::new();
        if alert.machine_id.is_empty() {
            errors.push("machine_id required");
        }
        if alert.prediction_type.is_empty() {
            errors.push("prediction type required");
        }
        if let Some(c) = confidence {
            if !(0.0..=1.0).contains(&c) {
                errors.push("confidence must be between 0 and 1");
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(errors.join(", ")))
        }
    }

    // ------------------------------------------------------------------
    // Metrics updates from the broker
    // ------------------------------------------------------------------

    /// Sanitize and persist an externally published metrics payload.
    /// Numeric fields round to 4 decimals, strings pass through, anything
    /// else is dropped.
    pub async fn handle_metrics_update(
        &self,
        machine_id: &str,
        metrics: serde_json::Map<String, serde_json::Value>,
    ) {
        let mut sanitized = serde_json::Map::new();
        for (key, value) in metrics {
            match value {
                serde_json::Value::Number(n) => {
                    if let Some(rounded) = n.as_f64().and_then(|f| {
                        sanitize_numeric(Some(f), TEMP_SOUND_PRECISION)
                    }) {
                        sanitized.insert(key, serde_json::json!(rounded));
                    }
                }
                serde_json::Value::String(s) => {
                    sanitized.insert(key, serde_json::Value::String(s));
                }
                _ => {}
            }
        }
        sanitized.insert(
            "last_updated".to_string(),
            serde_json::json!(now_rfc3339()),
        );
        let metrics = serde_json::Value::Object(sanitized);

        let result = execute_with_retry(&self.retry, "update machine metrics", || {
            self.store.update_machine_metrics(machine_id, &metrics)
        })
        .await;

        match result {
            Ok(()) => self.bus.emit(EngineEvent::MetricsUpdated {
                machine_id: machine_id.to_string(),
                metrics,
            }),
            Err(err) => {
                self.stats.inc_failed_inserts();
                log::error!("metrics for {} not updated: {}", machine_id, err);
                self.bus.emit(EngineEvent::DataError {
                    kind: "metrics".to_string(),
                    machine_id: machine_id.to_string(),
                    error: err.redacted().to_string(),
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Device registry
    // ------------------------------------------------------------------

    /// Mark a device online (sensor traffic implies presence). Every
    /// registry touch broadcasts fresh stats.
    pub fn register_device(&self, device_id: &str) {
        if self.registry.mark_online(device_id) {
            self.bus.emit(EngineEvent::DeviceConnected {
                device_id: device_id.to_string(),
            });
        }
        self.broadcast_stats();
    }

    /// Apply an explicit device status signal.
    pub fn handle_device_status(
        &self,
        machine_id: &str,
        status: &str,
        timestamp: Option<String>,
    ) {
        match status {
            "connected" | "online" => {
                if self.registry.mark_online(machine_id) {
                    self.bus.emit(EngineEvent::DeviceConnected {
                        device_id: machine_id.to_string(),
                    });
                }
                self.broadcast_stats();
            }
            "disconnected" | "offline" => {
                self.registry.mark_offline(machine_id);
                self.broadcast_stats();
            }
            other => log::debug!("ignoring device status {:?} from {}", other, machine_id),
        }

        self.bus.emit(EngineEvent::DeviceStatusChanged {
            machine_id: machine_id.to_string(),
            status: status.to_string(),
            timestamp,
        });
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.registry.count())
    }

    pub fn broadcast_stats(&self) {
        self.bus.emit(EngineEvent::Stats(self.snapshot()));
    }

    /// Periodic stats broadcast. Runs until the task is aborted.
    pub async fn run_stats_timer(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            interval.tick().await;
            self.broadcast_stats();
        }
    }
}
