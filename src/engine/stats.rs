//! Runtime statistics
//!
//! Process-wide operational counters, reset only on restart. The
//! connected-device count is never stored here; it is read from the
//! device registry at snapshot time so the set stays the single source
//! of truth.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct RuntimeStats {
    total_events: AtomicU64,
    successful_inserts: AtomicU64,
    failed_inserts: AtomicU64,
    mqtt_messages: AtomicU64,
    anomalies_detected: AtomicU64,
    broker_online: AtomicBool,
}

/// Point-in-time view broadcast to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_events: u64,
    pub successful_inserts: u64,
    pub failed_inserts: u64,
    pub mqtt_messages: u64,
    pub anomalies_detected: u64,
    pub connected_devices: u64,
    pub success_rate: String,
    pub mqtt_status: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl RuntimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_total_events(&self) {
        self.total_events.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_successful_inserts(&self) {
        self.successful_inserts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_failed_inserts(&self) {
        self.failed_inserts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_mqtt_messages(&self) {
        self.mqtt_messages.fetch_add(1, Ordering::SeqCst);
    }

    pub fn inc_anomalies_detected(&self) {
        self.anomalies_detected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_broker_online(&self, online: bool) {
        self.broker_online.store(online, Ordering::SeqCst);
    }

    pub fn broker_online(&self) -> bool {
        self.broker_online.load(Ordering::SeqCst)
    }

    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::SeqCst)
    }

    pub fn successful_inserts(&self) -> u64 {
        self.successful_inserts.load(Ordering::SeqCst)
    }

    pub fn failed_inserts(&self) -> u64 {
        self.failed_inserts.load(Ordering::SeqCst)
    }

    pub fn anomalies_detected(&self) -> u64 {
        self.anomalies_detected.load(Ordering::SeqCst)
    }

    /// Snapshot the counters. `connected_devices` comes from the registry.
    pub fn snapshot(&self, connected_devices: usize) -> StatsSnapshot {
        let total = self.total_events();
        let successful = self.successful_inserts();
        let success_rate = if total > 0 {
            format!("{:.2}%", successful as f64 / total as f64 * 100.0)
        } else {
            "0%".to_string()
        };

        StatsSnapshot {
            total_events: total,
            successful_inserts: successful,
            failed_inserts: self.failed_inserts(),
            mqtt_messages: self.mqtt_messages.load(Ordering::SeqCst),
            anomalies_detected: self.anomalies_detected(),
            connected_devices: connected_devices as u64,
            success_rate,
            mqtt_status: if self.broker_online() {
                "connected"
            } else {
                "disconnected"
            },
            timestamp: Utc::now(),
        }
    }
}
