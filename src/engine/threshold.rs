//! Threshold Store
//!
//! Per-machine warning/critical thresholds for temperature, vibration and
//! sound. Created with defaults on first access, tuned from the baseline
//! every 1000 samples, and replaceable per sensor family by operators.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::baseline::Baseline;

/// Warning/critical pair for one sensor family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorBand {
    pub warning: f64,
    pub critical: f64,
}

/// Full threshold set for one machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub temperature: SensorBand,
    pub vibration: SensorBand,
    pub sound: SensorBand,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            temperature: SensorBand {
                warning: 35.0,
                critical: 40.0,
            },
            vibration: SensorBand {
                warning: 1.2,
                critical: 1.8,
            },
            sound: SensorBand {
                warning: 0.8,
                critical: 1.0,
            },
        }
    }
}

/// Operator override. Merging happens at the sensor-family level: each
/// band present replaces the whole `{warning, critical}` pair for that
/// family, never individual fields.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ThresholdOverride {
    #[serde(default)]
    pub temperature: Option<SensorBand>,
    #[serde(default)]
    pub vibration: Option<SensorBand>,
    #[serde(default)]
    pub sound: Option<SensorBand>,
}

/// Per-machine threshold map. No `warning < critical` enforcement here;
/// the operator API boundary is free to validate before calling in.
pub struct ThresholdStore {
    defaults: ThresholdSet,
    map: RwLock<HashMap<String, ThresholdSet>>,
}

impl ThresholdStore {
    pub fn new(defaults: ThresholdSet) -> Self {
        Self {
            defaults,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Current thresholds for a machine, created from the defaults on
    /// first access.
    pub fn get_or_init(&self, machine_id: &str) -> ThresholdSet {
        if let Some(set) = self.map.read().get(machine_id) {
            return *set;
        }
        let mut map = self.map.write();
        let set = map
            .entry(machine_id.to_string())
            .or_insert(self.defaults);
        log::debug!("thresholds initialized for {}: {:?}", machine_id, set);
        *set
    }

    /// Adaptation rule, invoked from the baseline tracker every 1000
    /// samples. Sound thresholds are never adapted automatically.
    pub fn adapt(&self, machine_id: &str, baseline: &Baseline) {
        let mut map = self.map.write();
        let set = map
            .entry(machine_id.to_string())
            .or_insert(self.defaults);

        if baseline.temp_avg > 0.0 {
            set.temperature.warning = baseline.temp_avg + 5.0;
            set.temperature.critical = baseline.temp_avg + 10.0;
        }
        if baseline.vib_avg > 0.0 {
            set.vibration.warning = baseline.vib_avg * 2.0;
            set.vibration.critical = baseline.vib_avg * 3.0;
        }
        log::info!("thresholds adapted for {}: {:?}", machine_id, set);
    }

    /// Apply an operator override, last-write-wins. Returns the merged set.
    pub fn apply_override(&self, machine_id: &str, patch: ThresholdOverride) -> ThresholdSet {
        let mut map = self.map.write();
        let set = map
            .entry(machine_id.to_string())
            .or_insert(self.defaults);

        if let Some(band) = patch.temperature {
            set.temperature = band;
        }
        if let Some(band) = patch.vibration {
            set.vibration = band;
        }
        if let Some(band) = patch.sound {
            set.sound = band;
        }
        log::info!("thresholds overridden for {}: {:?}", machine_id, set);
        *set
    }

    /// Thresholds for a machine without creating an entry.
    pub fn get(&self, machine_id: &str) -> Option<ThresholdSet> {
        self.map.read().get(machine_id).copied()
    }
}
