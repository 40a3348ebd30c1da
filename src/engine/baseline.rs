//! Baseline Tracker
//!
//! Per-machine running averages of temperature and vibration magnitude,
//! lazily created on the first reading and never reset for the lifetime
//! of the process. Every 1000th sample triggers threshold adaptation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::threshold::ThresholdStore;

/// Samples between automatic threshold adaptations.
const ADAPT_INTERVAL: u64 = 1000;

/// Running baseline for one machine.
///
/// Temperature and vibration share a single `sample_count`: only readings
/// carrying a temperature advance the count, and the vibration average
/// divides by the same count. This mirrors the deployed behavior and is
/// kept as-is.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Baseline {
    pub sample_count: u64,
    pub temp_sum: f64,
    pub vib_sum: f64,
    pub temp_avg: f64,
    pub vib_avg: f64,
}

/// Tracker over all machines. Holds the threshold store so adaptation
/// happens as a side effect of `update`.
pub struct BaselineTracker {
    thresholds: Arc<ThresholdStore>,
    map: RwLock<HashMap<String, Baseline>>,
}

impl BaselineTracker {
    pub fn new(thresholds: Arc<ThresholdStore>) -> Self {
        Self {
            thresholds,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Fold one reading into the machine's baseline. Missing or zero
    /// values skip their branch; there are no error conditions.
    pub fn update(
        &self,
        machine_id: &str,
        temperature: Option<f64>,
        vibration_magnitude: f64,
    ) -> Baseline {
        let updated = {
            let mut map = self.map.write();
            let baseline = map.entry(machine_id.to_string()).or_default();

            if let Some(temp) = temperature {
                if temp > 0.0 {
                    baseline.sample_count += 1;
                    baseline.temp_sum += temp;
                    baseline.temp_avg = baseline.temp_sum / baseline.sample_count as f64;
                }
            }

            if vibration_magnitude > 0.0 {
                baseline.vib_sum += vibration_magnitude;
                baseline.vib_avg = baseline.vib_sum / baseline.sample_count as f64;
            }

            *baseline
        };

        if updated.sample_count > 0 && updated.sample_count % ADAPT_INTERVAL == 0 {
            self.thresholds.adapt(machine_id, &updated);
        }

        updated
    }

    /// Baseline snapshot for a machine, if one exists yet.
    pub fn get(&self, machine_id: &str) -> Option<Baseline> {
        self.map.read().get(machine_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::threshold::ThresholdSet;

    fn tracker() -> BaselineTracker {
        BaselineTracker::new(Arc::new(ThresholdStore::new(ThresholdSet::default())))
    }

    #[test]
    fn constant_temperature_converges_exactly() {
        let t = tracker();
        for _ in 0..500 {
            t.update("m1", Some(23.5), 0.0);
        }
        let b = t.get("m1").unwrap();
        assert_eq!(b.sample_count, 500);
        assert!((b.temp_avg - 23.5).abs() < 1e-9);
    }

    #[test]
    fn zero_or_missing_values_skip_their_branch() {
        let t = tracker();
        t.update("m1", None, 0.0);
        t.update("m1", Some(0.0), 0.0);
        let b = t.get("m1").unwrap();
        assert_eq!(b.sample_count, 0);
        assert_eq!(b.temp_sum, 0.0);
        assert_eq!(b.vib_sum, 0.0);
    }

    #[test]
    fn vibration_average_shares_the_temperature_count() {
        let t = tracker();
        t.update("m1", Some(20.0), 1.0);
        t.update("m1", Some(20.0), 1.0);
        // vibration-only reading: sum grows, count does not
        t.update("m1", None, 1.0);
        let b = t.get("m1").unwrap();
        assert_eq!(b.sample_count, 2);
        assert_eq!(b.vib_sum, 3.0);
        assert!((b.vib_avg - 1.5).abs() < 1e-9);
    }

    #[test]
    fn thousandth_sample_adapts_thresholds() {
        let thresholds = Arc::new(ThresholdStore::new(ThresholdSet::default()));
        let t = BaselineTracker::new(Arc::clone(&thresholds));
        for _ in 0..1000 {
            t.update("m1", Some(22.0), 0.0);
        }
        let set = thresholds.get("m1").expect("adaptation creates the entry");
        assert!((set.temperature.warning - 27.0).abs() < 1e-9);
        assert!((set.temperature.critical - 32.0).abs() < 1e-9);
    }

    #[test]
    fn adaptation_does_not_fire_between_intervals() {
        let thresholds = Arc::new(ThresholdStore::new(ThresholdSet::default()));
        let t = BaselineTracker::new(Arc::clone(&thresholds));
        for _ in 0..999 {
            t.update("m1", Some(22.0), 0.0);
        }
        assert!(thresholds.get("m1").is_none());
    }

    #[test]
    fn machines_are_tracked_independently() {
        let t = tracker();
        t.update("m1", Some(30.0), 0.0);
        t.update("m2", Some(10.0), 0.0);
        assert!((t.get("m1").unwrap().temp_avg - 30.0).abs() < 1e-9);
        assert!((t.get("m2").unwrap().temp_avg - 10.0).abs() < 1e-9);
    }
}
