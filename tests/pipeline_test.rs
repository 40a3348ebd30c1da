//! End-to-end pipeline tests against the in-memory store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use motorwatch::engine::ingest::parse_message;
use motorwatch::engine::{
    Engine, EngineError, EngineEvent, MotorState, RawReading, Severity,
};
use motorwatch::store::{DataStore, MemoryStore, StoreError};

fn reading(machine_id: &str, temp: f64, accel: (f64, f64, f64)) -> RawReading {
    RawReading {
        machine_id: Some(machine_id.to_string()),
        timestamp_rpi: Some("2026-02-01T08:30:00Z".to_string()),
        temperature_c: Some(temp),
        sound_amplitude: Some(0.4),
        accel_x_g: Some(accel.0),
        accel_y_g: Some(accel.1),
        accel_z_g: Some(accel.2),
    }
}

fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Store that fails `insert_raw_reading` a fixed number of times before
/// delegating to the in-memory store.
struct FlakyStore {
    inner: MemoryStore,
    raw_failures_left: AtomicU32,
    error: StoreError,
}

impl FlakyStore {
    fn new(raw_failures: u32, error: StoreError) -> Self {
        Self {
            inner: MemoryStore::new(),
            raw_failures_left: AtomicU32::new(raw_failures),
            error,
        }
    }
}

#[async_trait]
impl DataStore for FlakyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn insert_raw_reading(
        &self,
        reading: &motorwatch::engine::SensorReading,
    ) -> Result<(), StoreError> {
        let left = self.raw_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.raw_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(self.error.clone());
        }
        self.inner.insert_raw_reading(reading).await
    }

    async fn insert_prediction(
        &self,
        prediction: &motorwatch::engine::PredictionRecord,
    ) -> Result<motorwatch::engine::PredictionRecord, StoreError> {
        self.inner.insert_prediction(prediction).await
    }

    async fn insert_anomaly(
        &self,
        anomaly: &motorwatch::engine::AnomalyRecord,
    ) -> Result<motorwatch::engine::AnomalyRecord, StoreError> {
        self.inner.insert_anomaly(anomaly).await
    }

    async fn update_machine_status(
        &self,
        machine_id: &str,
        status: &motorwatch::engine::MachineStatus,
    ) -> Result<(), StoreError> {
        self.inner.update_machine_status(machine_id, status).await
    }

    async fn update_machine_metrics(
        &self,
        machine_id: &str,
        metrics: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.inner.update_machine_metrics(machine_id, metrics).await
    }
}

#[tokio::test]
async fn critical_reading_runs_full_write_sequence() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Default::default());
    let mut rx = engine.subscribe();

    let message = parse_message(
        "sensor/motor_01/data",
        serde_json::to_vec(&reading("ignored", 42.5, (0.1, 0.1, 0.1)))
            .unwrap()
            .as_slice(),
    )
    .unwrap();
    engine.handle_broker_message(message).await.unwrap();

    let readings = store.raw_readings();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].machine_id, "motor_01");

    let predictions = store.predictions();
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].prediction_type, "Overheating");
    assert_eq!(predictions[0].severity, Severity::Critical);
    assert_eq!(predictions[0].confidence, Some(0.95));

    let anomalies = store.anomalies();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].category, "temperature");
    assert!(anomalies[0].description.contains("42.5"));

    let status = store.status_of("motor_01").unwrap();
    assert_eq!(status.status, MotorState::Maintenance);
    assert_eq!(status.overall_severity, Severity::Critical);

    let metrics = store.metrics_of("motor_01").unwrap();
    assert_eq!(metrics["temperature_current"], serde_json::json!(42.5));

    assert_eq!(engine.stats().total_events(), 1);
    assert_eq!(engine.stats().successful_inserts(), 1);
    assert_eq!(engine.stats().failed_inserts(), 0);
    assert_eq!(engine.stats().anomalies_detected(), 1);

    let names: Vec<&str> = drain_events(&mut rx).iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec![
            "stats",
            "device-connected",
            "stats",
            "rawSensorData",
            "metricsUpdate",
            "new-anomaly",
            "motor-status",
            "new-prediction",
        ]
    );
}

#[tokio::test]
async fn normal_reading_stores_raw_data_only() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Default::default());

    let stored = engine
        .handle_raw_reading(reading("motor_02", 25.0, (0.1, 0.1, 0.1)))
        .await
        .unwrap();
    assert!(stored.is_some());

    assert_eq!(store.raw_readings().len(), 1);
    assert!(store.predictions().is_empty());
    assert!(store.anomalies().is_empty());
    assert!(store.status_of("motor_02").is_none());
    assert_eq!(engine.stats().anomalies_detected(), 0);
}

#[tokio::test]
async fn validation_failure_is_not_a_persistence_failure() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Default::default());
    let mut rx = engine.subscribe();
    drain_events(&mut rx);

    let result = engine.handle_raw_reading(RawReading::default()).await;
    match result {
        Err(EngineError::Validation(msg)) => assert!(msg.contains("machine_id required")),
        other => panic!("expected validation error, got {:?}", other.map(|_| ())),
    }

    assert_eq!(engine.stats().total_events(), 1);
    assert_eq!(engine.stats().failed_inserts(), 0);
    assert!(store.raw_readings().is_empty());
    assert!(drain_events(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_store_failures_are_retried_with_backoff() {
    let store = Arc::new(FlakyStore::new(
        2,
        StoreError::Connection("connection refused".to_string()),
    ));
    let engine = Engine::new(store.clone(), Default::default());

    let started = tokio::time::Instant::now();
    let stored = engine
        .handle_raw_reading(reading("motor_03", 25.0, (0.1, 0.1, 0.1)))
        .await
        .unwrap();

    assert!(stored.is_some());
    // two failed attempts: 1000ms + 2000ms of backoff
    assert_eq!(started.elapsed(), Duration::from_millis(3000));
    assert_eq!(engine.stats().successful_inserts(), 1);
    assert_eq!(engine.stats().failed_inserts(), 0);
    assert_eq!(store.inner.raw_readings().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_count_one_failure_and_stop_the_pipeline() {
    let store = Arc::new(FlakyStore::new(
        u32::MAX,
        StoreError::Connection("connection refused".to_string()),
    ));
    let engine = Engine::new(store.clone(), Default::default());
    let mut rx = engine.subscribe();
    drain_events(&mut rx);

    let stored = engine
        .handle_raw_reading(reading("motor_04", 42.5, (0.1, 0.1, 0.1)))
        .await
        .unwrap();

    assert!(stored.is_none());
    assert_eq!(engine.stats().failed_inserts(), 1);
    assert_eq!(engine.stats().anomalies_detected(), 0);
    assert!(store.inner.predictions().is_empty());
    assert!(store.inner.metrics_of("motor_04").is_none());

    let events = drain_events(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        EngineEvent::DataError {
            kind,
            machine_id,
            error,
        } => {
            assert_eq!(kind, "sensor_data");
            assert_eq!(machine_id, "motor_04");
            assert_eq!(error, "Database connection error");
        }
        other => panic!("expected dataError, got {}", other.name()),
    }
}

#[tokio::test]
async fn fatal_store_error_does_not_retry() {
    let store = Arc::new(FlakyStore::new(
        u32::MAX,
        StoreError::InvalidFormat("bad column".to_string()),
    ));
    let engine = Engine::new(store.clone(), Default::default());

    let stored = engine
        .handle_raw_reading(reading("motor_05", 25.0, (0.1, 0.1, 0.1)))
        .await
        .unwrap();

    assert!(stored.is_none());
    // a single attempt was consumed, no retries
    assert_eq!(store.raw_failures_left.load(Ordering::SeqCst), u32::MAX - 1);
}

#[tokio::test]
async fn normal_external_prediction_skips_anomaly_record() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Default::default());

    let message = parse_message(
        "prediction/motor_06/alert",
        br#"{"type": "Normal", "severity": "normal", "details": {"xgb_confidence": 0.912345}}"#,
    )
    .unwrap();
    engine.handle_broker_message(message).await.unwrap();

    let predictions = store.predictions();
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].confidence, Some(0.9123));
    assert!(store.anomalies().is_empty());

    let status = store.status_of("motor_06").unwrap();
    assert_eq!(status.status, MotorState::Running);
}

#[tokio::test]
async fn out_of_range_confidence_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Default::default());

    let message = parse_message(
        "prediction/motor_07/alert",
        br#"{"type": "Vibration", "details": {"xgb_confidence": 1.4}}"#,
    )
    .unwrap();
    let result = engine.handle_broker_message(message).await;

    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert!(store.predictions().is_empty());
}

#[tokio::test]
async fn device_status_messages_drive_the_registry() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store, Default::default());

    let online = parse_message(
        "device/motor_08/status",
        br#"{"status": "connected", "timestamp": "2026-02-01T08:30:00Z"}"#,
    )
    .unwrap();
    engine.handle_broker_message(online).await.unwrap();
    assert!(engine.registry().is_online("motor_08"));
    assert_eq!(engine.registry().count(), 1);

    let offline = parse_message("device/motor_08/status", br#"{"status": "offline"}"#).unwrap();
    engine.handle_broker_message(offline).await.unwrap();
    assert!(!engine.registry().is_online("motor_08"));
    assert_eq!(engine.registry().count(), 0);

    assert_eq!(engine.snapshot().mqtt_messages, 2);
}

#[tokio::test]
async fn metrics_update_sanitizes_and_stamps() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Default::default());

    let message = parse_message(
        "metrics/motor_09/update",
        br#"{"rpm": 1480.123456, "mode": "auto", "nested": {"x": 1}}"#,
    )
    .unwrap();
    engine.handle_broker_message(message).await.unwrap();

    let metrics = store.metrics_of("motor_09").unwrap();
    assert_eq!(metrics["rpm"], serde_json::json!(1480.1235));
    assert_eq!(metrics["mode"], serde_json::json!("auto"));
    assert!(metrics.get("nested").is_none());
    assert!(metrics.get("last_updated").is_some());
}

#[tokio::test]
async fn operator_override_replaces_whole_bands() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(store.clone(), Default::default());

    let updated = engine.override_thresholds(
        "motor_10",
        motorwatch::engine::ThresholdOverride {
            temperature: Some(motorwatch::engine::SensorBand {
                warning: 50.0,
                critical: 60.0,
            }),
            ..Default::default()
        },
    );
    assert_eq!(updated.temperature.warning, 50.0);
    // untouched bands keep their defaults
    assert_eq!(updated.vibration.critical, 1.8);

    // a hot reading under the raised threshold stays normal
    engine
        .handle_raw_reading(reading("motor_10", 42.5, (0.1, 0.1, 0.1)))
        .await
        .unwrap();
    assert!(store.anomalies().is_empty());
}
