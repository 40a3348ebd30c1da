//! Sanitizer/Validator
//!
//! Normalizes inbound readings before anything else touches them:
//! required-field checks, finite-number checks, and fixed-precision
//! rounding. Pure functions, no side effects.

use chrono::DateTime;

use super::types::{RawReading, SensorReading};

/// Decimal precision for temperature and sound fields.
pub const TEMP_SOUND_PRECISION: u32 = 4;
/// Decimal precision for acceleration axes.
pub const ACCEL_PRECISION: u32 = 6;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate a raw reading. All failures are collected, not short-circuited.
pub fn validate(raw: &RawReading) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    match raw.machine_id.as_deref() {
        Some(id) if !id.is_empty() => {}
        _ => errors.push(ValidationError("machine_id required".to_string())),
    }

    if let Some(temp) = raw.temperature_c {
        if !temp.is_finite() {
            errors.push(ValidationError(
                "temperature_c must be a valid number".to_string(),
            ));
        }
    }

    if let Some(ts) = raw.timestamp_rpi.as_deref() {
        if DateTime::parse_from_rfc3339(ts).is_err() {
            errors.push(ValidationError(
                "timestamp_rpi must be a valid date".to_string(),
            ));
        }
    }

    errors
}

/// Join collected validation errors into the single message surfaced to
/// the ingestion caller.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Round half away from zero at a fixed decimal precision.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Round an optional numeric field; non-finite values sanitize to `None`.
pub fn sanitize_numeric(value: Option<f64>, precision: u32) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| round_to(v, precision))
}

/// Produce the immutable, precision-rounded reading. Assumes `validate`
/// already passed; a missing timestamp defaults to now.
pub fn sanitize(raw: &RawReading) -> SensorReading {
    SensorReading {
        machine_id: raw.machine_id.clone().unwrap_or_default(),
        timestamp_rpi: raw
            .timestamp_rpi
            .clone()
            .unwrap_or_else(super::types::now_rfc3339),
        temperature_c: sanitize_numeric(raw.temperature_c, TEMP_SOUND_PRECISION),
        sound_amplitude: sanitize_numeric(raw.sound_amplitude, TEMP_SOUND_PRECISION),
        accel_x_g: sanitize_numeric(raw.accel_x_g, ACCEL_PRECISION),
        accel_y_g: sanitize_numeric(raw.accel_y_g, ACCEL_PRECISION),
        accel_z_g: sanitize_numeric(raw.accel_z_g, ACCEL_PRECISION),
    }
}
