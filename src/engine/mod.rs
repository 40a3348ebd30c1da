//! Detection and processing engine

pub mod baseline;
pub mod classifier;
pub mod events;
pub mod ingest;
pub mod pipeline;
pub mod registry;
pub mod retry;
pub mod sanitize;
pub mod stats;
pub mod threshold;
pub mod types;

pub use events::{EngineEvent, EventBus};
pub use pipeline::{Engine, EngineError};
pub use retry::RetryPolicy;
pub use stats::{RuntimeStats, StatsSnapshot};
pub use threshold::{SensorBand, ThresholdOverride, ThresholdSet};
pub use types::{
    AlertDetails, AnomalyEvent, AnomalyRecord, AnomalyType, MachineStatus, MotorState,
    PredictionAlert, PredictionRecord, RawReading, SensorReading, Severity,
};
