//! Core engine types
//!
//! Data structures only - no pipeline logic.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SENSOR READINGS
// ============================================================================

/// Raw reading as published by an edge device, before validation.
///
/// `machine_id` is normally filled in from the broker topic, not the
/// payload, which is why every field is optional here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default)]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub timestamp_rpi: Option<String>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub sound_amplitude: Option<f64>,
    #[serde(default)]
    pub accel_x_g: Option<f64>,
    #[serde(default)]
    pub accel_y_g: Option<f64>,
    #[serde(default)]
    pub accel_z_g: Option<f64>,
}

/// Validated, precision-rounded sensor reading. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub machine_id: String,
    pub timestamp_rpi: String,
    pub temperature_c: Option<f64>,
    pub sound_amplitude: Option<f64>,
    pub accel_x_g: Option<f64>,
    pub accel_y_g: Option<f64>,
    pub accel_z_g: Option<f64>,
}

// ============================================================================
// SEVERITY
// ============================================================================

/// Ordinal anomaly severity. `Elevated` exists in the data model and can
/// arrive on externally supplied predictions, but the local classifier
/// only ever produces `Warning` and `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Elevated,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Normal
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Elevated => "elevated",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ANOMALIES
// ============================================================================

/// Anomaly kinds the local classifier can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyType {
    Overheating,
    TemperatureAlert,
    Vibration,
    VibrationAlert,
}

impl AnomalyType {
    /// Label as carried on prediction alerts.
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyType::Overheating => "Overheating",
            AnomalyType::TemperatureAlert => "Temperature Alert",
            AnomalyType::Vibration => "Vibration",
            AnomalyType::VibrationAlert => "Vibration Alert",
        }
    }
}

/// Map a prediction type label to the category stored on anomaly records.
/// Unknown labels (external ML predictions the engine has no detector for)
/// fall back to "other".
pub fn anomaly_category(prediction_type: &str) -> &'static str {
    match prediction_type {
        "Overheating" | "Temperature" | "Temperature Alert" => "temperature",
        "Vibration" | "Vibration Alert" | "Imbalance" => "vibration",
        "Bearing" | "Bearing Wear" => "bearing",
        "Sound" => "sound",
        "Normal" => "normal",
        _ => "other",
    }
}

/// Diagnostic detail attached to alerts, anomalies and predictions.
///
/// Locally classified anomalies fill the threshold/baseline fields;
/// externally supplied predictions fill the model fields. Both shapes
/// travel through the same write sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_used: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_vib: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xgb_prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xgb_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data_sample: Option<serde_json::Value>,
}

/// Classified anomaly, produced by the local detector. Immutable.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyEvent {
    pub machine_id: String,
    pub kind: AnomalyType,
    pub severity: Severity,
    pub message: String,
    pub detected_at: String,
    pub details: AlertDetails,
}

impl AnomalyEvent {
    /// Convert into the alert shape the persistence sequence consumes.
    pub fn into_alert(self) -> PredictionAlert {
        PredictionAlert {
            machine_id: self.machine_id,
            prediction_type: self.kind.label().to_string(),
            severity: self.severity,
            message: self.message,
            timestamp: Some(self.detected_at),
            details: self.details,
        }
    }
}

// ============================================================================
// PREDICTION ALERTS AND PERSISTED RECORDS
// ============================================================================

/// A prediction alert: either a locally classified anomaly or an
/// externally supplied model prediction arriving over the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionAlert {
    pub machine_id: String,
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

/// Persisted prediction row, derived 1:1 from a `PredictionAlert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub machine_id: String,
    pub prediction_type: String,
    pub confidence: Option<f64>,
    pub severity: Severity,
    pub timestamp: String,
    pub xgb_prediction: Option<String>,
    pub xgb_confidence: Option<f64>,
    pub dl_prediction: Option<String>,
    pub dl_confidence: Option<f64>,
    pub raw_data_sample: Option<serde_json::Value>,
}

/// Persisted anomaly row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: Uuid,
    pub machine_id: String,
    #[serde(rename = "type")]
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub detected_at: String,
    pub prediction_confidence: Option<f64>,
    pub ml_details: serde_json::Value,
}

// ============================================================================
// MACHINE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorState {
    Running,
    Maintenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineStatus {
    pub status: MotorState,
    pub overall_severity: Severity,
    pub last_prediction: String,
    pub last_updated: String,
}

/// Current UTC time as an RFC 3339 string, the timestamp format used on
/// every persisted record and broadcast payload.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
