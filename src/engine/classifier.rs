//! Anomaly Classifier
//!
//! Stateless decision tree over a sanitized reading, the machine's
//! current thresholds, and its baseline. First match wins: a critical
//! temperature suppresses every vibration check even when both hold.
//! Sound thresholds exist in the store but have no detector here.

use super::baseline::Baseline;
use super::stats::RuntimeStats;
use super::threshold::ThresholdSet;
use super::types::{AlertDetails, AnomalyEvent, AnomalyType, Severity, SensorReading};

const OVERHEATING_CONFIDENCE: f64 = 0.95;
const TEMP_ALERT_CONFIDENCE: f64 = 0.78;
const VIBRATION_CRITICAL_CONFIDENCE: f64 = 0.88;
const VIBRATION_ALERT_CONFIDENCE: f64 = 0.72;

/// Fallback baseline temperature for deviation reporting before any
/// baseline has accumulated.
const DEFAULT_BASELINE_TEMP: f64 = 20.0;

/// Euclidean norm of the three acceleration axes, missing axes as 0.
pub fn vibration_magnitude(reading: &SensorReading) -> f64 {
    let ax = reading.accel_x_g.unwrap_or(0.0);
    let ay = reading.accel_y_g.unwrap_or(0.0);
    let az = reading.accel_z_g.unwrap_or(0.0);
    (ax * ax + ay * ay + az * az).sqrt()
}

/// Classify a reading. Returns at most one anomaly; `None` means normal.
/// The only side effect is the anomaly counter on a non-`None` result.
pub fn classify(
    reading: &SensorReading,
    thresholds: &ThresholdSet,
    baseline: &Baseline,
    stats: &RuntimeStats,
) -> Option<AnomalyEvent> {
    let magnitude = vibration_magnitude(reading);
    let raw_sample = serde_json::to_value(reading).ok();

    let (kind, severity, message, details) = if reading
        .temperature_c
        .map_or(false, |t| t > thresholds.temperature.critical)
    {
        let temp = reading.temperature_c.unwrap_or_default();
        let base = if baseline.temp_avg > 0.0 {
            baseline.temp_avg
        } else {
            DEFAULT_BASELINE_TEMP
        };
        let deviation = (temp - base) / base * 100.0;
        (
            AnomalyType::Overheating,
            Severity::Critical,
            format!(
                "Critical overheating detected. Temperature: {:.1}\u{b0}C (threshold: {}\u{b0}C).",
                temp, thresholds.temperature.critical
            ),
            AlertDetails {
                threshold_used: Some(thresholds.temperature.critical),
                baseline_temp: (baseline.temp_avg > 0.0).then_some(baseline.temp_avg),
                deviation_percent: Some(deviation),
                confidence: Some(OVERHEATING_CONFIDENCE),
                raw_data_sample: raw_sample,
                ..Default::default()
            },
        )
    } else if reading
        .temperature_c
        .map_or(false, |t| t > thresholds.temperature.warning)
    {
        let temp = reading.temperature_c.unwrap_or_default();
        (
            AnomalyType::TemperatureAlert,
            Severity::Warning,
            format!("Elevated temperature detected: {:.1}\u{b0}C.", temp),
            AlertDetails {
                threshold_used: Some(thresholds.temperature.warning),
                confidence: Some(TEMP_ALERT_CONFIDENCE),
                raw_data_sample: raw_sample,
                ..Default::default()
            },
        )
    } else if magnitude > thresholds.vibration.critical {
        (
            AnomalyType::Vibration,
            Severity::Critical,
            format!(
                "Critical vibration detected. Magnitude: {:.2}g (threshold: {}g).",
                magnitude, thresholds.vibration.critical
            ),
            AlertDetails {
                threshold_used: Some(thresholds.vibration.critical),
                baseline_vib: (baseline.vib_avg > 0.0).then_some(baseline.vib_avg),
                confidence: Some(VIBRATION_CRITICAL_CONFIDENCE),
                raw_data_sample: raw_sample,
                ..Default::default()
            },
        )
    } else if magnitude > thresholds.vibration.warning {
        (
            AnomalyType::VibrationAlert,
            Severity::Warning,
            format!("Abnormal vibration detected. Magnitude: {:.2}g.", magnitude),
            AlertDetails {
                threshold_used: Some(thresholds.vibration.warning),
                confidence: Some(VIBRATION_ALERT_CONFIDENCE),
                raw_data_sample: raw_sample,
                ..Default::default()
            },
        )
    } else {
        return None;
    };

    stats.inc_anomalies_detected();

    Some(AnomalyEvent {
        machine_id: reading.machine_id.clone(),
        kind,
        severity,
        message,
        detected_at: reading.timestamp_rpi.clone(),
        details,
    })
}
