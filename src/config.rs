//! Shared runtime configuration and live status.
//!
//! Thresholds are written from the remote attribute context and read by the
//! sampling loop; the status cell flows the other way. Both are plain
//! atomics: each field is independently meaningful and the pair never needs
//! to change as a unit, so no lock is involved.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use serde::{Deserialize, Serialize};

/// Runtime thresholds for sample classification.
///
/// `noise_threshold` is the voicing floor: above it a sample counts as
/// voiced and the pitch channel is read. `alert_threshold` is the alert
/// level: above it the amplitude is logged and the actuator pulsed.
///
/// The dirty flag hands persistence to the sampling loop, which is the only
/// flash writer.
#[derive(Debug)]
pub struct ThresholdConfig {
    noise: AtomicU16,
    alert: AtomicU16,
    dirty: AtomicBool,
}

impl ThresholdConfig {
    /// Both thresholds zero: every nonzero sample is voiced and
    /// alert-worthy until the remote service or a stored record configures
    /// real levels. Suitable for a `static`.
    pub const fn new() -> Self {
        Self {
            noise: AtomicU16::new(0),
            alert: AtomicU16::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn noise_threshold(&self) -> u16 {
        self.noise.load(Ordering::Relaxed)
    }

    pub fn alert_threshold(&self) -> u16 {
        self.alert.load(Ordering::Relaxed)
    }

    /// Sets the voicing floor and marks the pair dirty for persistence.
    pub fn set_noise_threshold(&self, value: u16) {
        self.noise.store(value, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    /// Sets the alert level and marks the pair dirty for persistence.
    pub fn set_alert_threshold(&self, value: u16) {
        self.alert.store(value, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    /// Takes the dirty marker: true at most once per remote update burst.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::Acquire)
    }

    /// Re-marks the pair dirty. A failed persistence attempt calls this so
    /// the values are retried on a later cycle instead of being dropped.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Current values in persistable form.
    pub fn snapshot(&self) -> StoredThresholds {
        StoredThresholds {
            noise: self.noise_threshold(),
            alert: self.alert_threshold(),
        }
    }

    /// Applies stored values without marking the pair dirty.
    pub fn restore(&self, stored: &StoredThresholds) {
        self.noise.store(stored.noise, Ordering::Relaxed);
        self.alert.store(stored.alert, Ordering::Relaxed);
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Threshold pair as persisted in the reserved config record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoredThresholds {
    pub noise: u16,
    pub alert: u16,
}

/// Last published cycle readings, served by the remote status field.
///
/// Written by the sampling loop once per cycle, read from the remote
/// attribute context.
#[derive(Debug)]
pub struct NodeStatus {
    amplitude: AtomicU16,
    average_pitch: AtomicU16,
    minimum_pitch: AtomicU16,
    maximum_pitch: AtomicU16,
}

impl NodeStatus {
    /// Encoded size of the status field in bytes.
    pub const BYTES: usize = 8;

    /// All-zero status, suitable for a `static`.
    pub const fn new() -> Self {
        Self {
            amplitude: AtomicU16::new(0),
            average_pitch: AtomicU16::new(0),
            minimum_pitch: AtomicU16::new(0),
            maximum_pitch: AtomicU16::new(0),
        }
    }

    /// Publishes one cycle's readings.
    pub fn publish(&self, amplitude: u16, average: u16, minimum: u16, maximum: u16) {
        self.amplitude.store(amplitude, Ordering::Relaxed);
        self.average_pitch.store(average, Ordering::Relaxed);
        self.minimum_pitch.store(minimum, Ordering::Relaxed);
        self.maximum_pitch.store(maximum, Ordering::Relaxed);
    }

    pub fn amplitude(&self) -> u16 {
        self.amplitude.load(Ordering::Relaxed)
    }

    pub fn average_pitch(&self) -> u16 {
        self.average_pitch.load(Ordering::Relaxed)
    }

    pub fn minimum_pitch(&self) -> u16 {
        self.minimum_pitch.load(Ordering::Relaxed)
    }

    pub fn maximum_pitch(&self) -> u16 {
        self.maximum_pitch.load(Ordering::Relaxed)
    }

    /// Status field wire form: amplitude, average, minimum, maximum as
    /// little-endian u16.
    pub fn encode(&self) -> [u8; Self::BYTES] {
        let mut bytes = [0u8; Self::BYTES];
        bytes[0..2].copy_from_slice(&self.amplitude().to_le_bytes());
        bytes[2..4].copy_from_slice(&self.average_pitch().to_le_bytes());
        bytes[4..6].copy_from_slice(&self.minimum_pitch().to_le_bytes());
        bytes[6..8].copy_from_slice(&self.maximum_pitch().to_le_bytes());
        bytes
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_start_at_zero_and_clean() {
        let config = ThresholdConfig::new();
        assert_eq!(config.noise_threshold(), 0);
        assert_eq!(config.alert_threshold(), 0);
        assert!(!config.take_dirty());
    }

    #[test]
    fn writes_mark_dirty_exactly_once() {
        let config = ThresholdConfig::new();
        config.set_noise_threshold(50);
        config.set_alert_threshold(80);
        assert_eq!(config.noise_threshold(), 50);
        assert_eq!(config.alert_threshold(), 80);
        assert!(config.take_dirty());
        assert!(!config.take_dirty());
    }

    #[test]
    fn mark_dirty_rearms_a_taken_marker() {
        let config = ThresholdConfig::new();
        config.set_noise_threshold(50);
        assert!(config.take_dirty());
        config.mark_dirty();
        assert!(config.take_dirty());
        assert!(!config.take_dirty());
    }

    #[test]
    fn restore_does_not_mark_dirty() {
        let config = ThresholdConfig::new();
        config.restore(&StoredThresholds {
            noise: 40,
            alert: 90,
        });
        assert_eq!(config.snapshot().noise, 40);
        assert_eq!(config.snapshot().alert, 90);
        assert!(!config.take_dirty());
    }

    #[test]
    fn status_encodes_little_endian_fields() {
        let status = NodeStatus::new();
        status.publish(0x0102, 0x0304, 0x0506, 0x0708);
        assert_eq!(
            status.encode(),
            [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07]
        );
    }
}
