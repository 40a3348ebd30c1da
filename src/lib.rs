//! MotorWatch - Adaptive anomaly detection for industrial motor telemetry
//!
//! Turns raw sensor readings (temperature, acceleration, sound) into
//! classified anomalies, keeps per-machine detection thresholds tuned
//! from an online baseline, coordinates persistence with retry, and
//! fans out real-time events to subscribers.

pub mod broker;
pub mod config;
pub mod engine;
pub mod store;
