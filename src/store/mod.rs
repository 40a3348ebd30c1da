//! Abstract data store
//!
//! The engine persists through this trait only; concrete backends are
//! somebody else's problem. Errors carry a retryable/fatal classification
//! consumed by the persistence coordinator, plus an operator-safe message
//! for `dataError` broadcasts.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::types::{
    AnomalyRecord, MachineStatus, PredictionRecord, SensorReading,
};

pub use memory::MemoryStore;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("required field missing: {0}")]
    MissingField(String),
    #[error("invalid data format: {0}")]
    InvalidFormat(String),
    #[error("unknown machine reference: {0}")]
    UnknownMachine(String),
    #[error("record already exists: {0}")]
    Duplicate(String),
    #[error("store failure: {0}")]
    Other(String),
}

impl StoreError {
    /// Only transient connectivity failures are eligible for backoff
    /// retry; everything else aborts immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout(_))
    }

    /// Operator-safe message carried on `dataError` events. Inner detail
    /// stays in the logs.
    pub fn redacted(&self) -> &'static str {
        match self {
            StoreError::Connection(_) => "Database connection error",
            StoreError::Timeout(_) => "Database operation timed out",
            StoreError::MissingField(_) => "Required field missing",
            StoreError::InvalidFormat(_) => "Invalid data format",
            StoreError::UnknownMachine(_) => "Unknown machine reference",
            StoreError::Duplicate(_) => "Record already exists",
            StoreError::Other(_) => "Database error",
        }
    }
}

/// Persistence operations the pipeline needs. Insert operations return
/// the stored record so broadcasts carry store-assigned identity.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Cheap reachability check, used once at startup.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_raw_reading(&self, reading: &SensorReading) -> Result<(), StoreError>;

    async fn insert_prediction(
        &self,
        prediction: &PredictionRecord,
    ) -> Result<PredictionRecord, StoreError>;

    async fn insert_anomaly(&self, anomaly: &AnomalyRecord) -> Result<AnomalyRecord, StoreError>;

    async fn update_machine_status(
        &self,
        machine_id: &str,
        status: &MachineStatus,
    ) -> Result<(), StoreError>;

    async fn update_machine_metrics(
        &self,
        machine_id: &str,
        metrics: &serde_json::Value,
    ) -> Result<(), StoreError>;
}
