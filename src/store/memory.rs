//! In-memory data store
//!
//! Backs the binary when no external store is wired in, and every test.
//! Thread-safe through `parking_lot` mutexes.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::engine::types::{
    AnomalyRecord, MachineStatus, PredictionRecord, SensorReading,
};

use super::{DataStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    raw_readings: Mutex<Vec<SensorReading>>,
    predictions: Mutex<Vec<PredictionRecord>>,
    anomalies: Mutex<Vec<AnomalyRecord>>,
    statuses: Mutex<HashMap<String, MachineStatus>>,
    metrics: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_readings(&self) -> Vec<SensorReading> {
        self.raw_readings.lock().clone()
    }

    pub fn predictions(&self) -> Vec<PredictionRecord> {
        self.predictions.lock().clone()
    }

    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        self.anomalies.lock().clone()
    }

    pub fn status_of(&self, machine_id: &str) -> Option<MachineStatus> {
        self.statuses.lock().get(machine_id).cloned()
    }

    pub fn metrics_of(&self, machine_id: &str) -> Option<serde_json::Value> {
        self.metrics.lock().get(machine_id).cloned()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_raw_reading(&self, reading: &SensorReading) -> Result<(), StoreError> {
        self.raw_readings.lock().push(reading.clone());
        Ok(())
    }

    async fn insert_prediction(
        &self,
        prediction: &PredictionRecord,
    ) -> Result<PredictionRecord, StoreError> {
        self.predictions.lock().push(prediction.clone());
        Ok(prediction.clone())
    }

    async fn insert_anomaly(&self, anomaly: &AnomalyRecord) -> Result<AnomalyRecord, StoreError> {
        self.anomalies.lock().push(anomaly.clone());
        Ok(anomaly.clone())
    }

    async fn update_machine_status(
        &self,
        machine_id: &str,
        status: &MachineStatus,
    ) -> Result<(), StoreError> {
        self.statuses
            .lock()
            .insert(machine_id.to_string(), status.clone());
        Ok(())
    }

    async fn update_machine_metrics(
        &self,
        machine_id: &str,
        metrics: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.metrics
            .lock()
            .insert(machine_id.to_string(), metrics.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::now_rfc3339;

    fn reading(machine_id: &str) -> SensorReading {
        SensorReading {
            machine_id: machine_id.to_string(),
            timestamp_rpi: now_rfc3339(),
            temperature_c: Some(25.0),
            sound_amplitude: None,
            accel_x_g: None,
            accel_y_g: None,
            accel_z_g: None,
        }
    }

    #[tokio::test]
    async fn inserted_readings_are_readable_back() {
        let store = MemoryStore::new();
        store.insert_raw_reading(&reading("m1")).await.unwrap();
        store.insert_raw_reading(&reading("m2")).await.unwrap();
        let rows = store.raw_readings();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].machine_id, "m1");
    }

    #[tokio::test]
    async fn metrics_update_overwrites_previous() {
        let store = MemoryStore::new();
        store
            .update_machine_metrics("m1", &serde_json::json!({"temperature_current": 20.0}))
            .await
            .unwrap();
        store
            .update_machine_metrics("m1", &serde_json::json!({"temperature_current": 30.0}))
            .await
            .unwrap();
        let metrics = store.metrics_of("m1").unwrap();
        assert_eq!(metrics["temperature_current"], 30.0);
    }
}
