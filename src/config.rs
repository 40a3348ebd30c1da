//! Configuration module

use std::env;
use std::time::Duration;

use crate::engine::{SensorBand, ThresholdSet};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// MQTT broker hostname
    pub mqtt_broker: String,

    /// MQTT broker port
    pub mqtt_port: u16,

    /// Optional broker credentials
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,

    /// Interval between stats broadcasts
    pub stats_interval: Duration,

    /// Grace period for in-flight work on shutdown
    pub shutdown_grace: Duration,

    /// Starting thresholds for machines with no history
    pub default_thresholds: ThresholdSet,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            mqtt_broker: env::var("MQTT_BROKER").unwrap_or_else(|_| "localhost".to_string()),

            mqtt_port: env::var("MQTT_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1883),

            mqtt_username: env::var("MQTT_USERNAME").ok(),
            mqtt_password: env::var("MQTT_PASSWORD").ok(),

            stats_interval: Duration::from_secs(
                env::var("STATS_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),

            shutdown_grace: Duration::from_secs(
                env::var("SHUTDOWN_GRACE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),

            default_thresholds: Self::thresholds_from_env(),
        }
    }

    fn thresholds_from_env() -> ThresholdSet {
        let base = ThresholdSet::default();
        ThresholdSet {
            temperature: SensorBand {
                warning: env_f64("TEMP_WARNING_THRESHOLD", base.temperature.warning),
                critical: env_f64("TEMP_CRITICAL_THRESHOLD", base.temperature.critical),
            },
            vibration: SensorBand {
                warning: env_f64("VIB_WARNING_THRESHOLD", base.vibration.warning),
                critical: env_f64("VIB_CRITICAL_THRESHOLD", base.vibration.critical),
            },
            sound: SensorBand {
                warning: env_f64("SOUND_WARNING_THRESHOLD", base.sound.warning),
                critical: env_f64("SOUND_CRITICAL_THRESHOLD", base.sound.critical),
            },
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
