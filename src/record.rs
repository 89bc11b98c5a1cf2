//! Persisted record types for the telemetry log.
//!
//! Both record kinds use fixed-layout little-endian encodings with no
//! version field; readers validate by exact length only.

use crate::error::NodeError;

/// Samples per persisted amplitude batch.
pub const AMPLITUDE_BATCH_LEN: usize = 32;

/// Encoded size of an amplitude batch record.
pub const AMPLITUDE_RECORD_BYTES: usize = 4 * AMPLITUDE_BATCH_LEN;

/// Encoded size of a pitch aggregate record.
pub const PITCH_RECORD_BYTES: usize = 10;

/// One above-alert amplitude reading.
///
/// The timestamp is coarse uptime (whole seconds since boot, truncated to
/// `u16`), not wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmplitudeSample {
    pub amplitude: u16,
    pub timestamp: u16,
}

/// A full batch of above-alert amplitude samples.
///
/// Batches are only ever persisted full; a partially filled buffer lives in
/// the controller and never reaches storage.
///
/// Binary format (little-endian, 128 bytes):
/// - `amplitudes`: 64 bytes (32 x u16), in arrival order
/// - `timestamps`: 64 bytes (32 x u16), matching positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmplitudeBatch {
    pub amplitudes: [u16; AMPLITUDE_BATCH_LEN],
    pub timestamps: [u16; AMPLITUDE_BATCH_LEN],
}

impl AmplitudeBatch {
    /// Builds a batch from exactly [`AMPLITUDE_BATCH_LEN`] samples.
    /// Returns `None` for any other count.
    pub fn from_samples(samples: &[AmplitudeSample]) -> Option<Self> {
        if samples.len() != AMPLITUDE_BATCH_LEN {
            return None;
        }
        let mut batch = Self {
            amplitudes: [0; AMPLITUDE_BATCH_LEN],
            timestamps: [0; AMPLITUDE_BATCH_LEN],
        };
        for (i, sample) in samples.iter().enumerate() {
            batch.amplitudes[i] = sample.amplitude;
            batch.timestamps[i] = sample.timestamp;
        }
        Some(batch)
    }

    /// Sample at position `i` in arrival order.
    pub fn sample(&self, i: usize) -> AmplitudeSample {
        AmplitudeSample {
            amplitude: self.amplitudes[i],
            timestamp: self.timestamps[i],
        }
    }

    /// Encoded size in bytes.
    pub const fn size() -> usize {
        AMPLITUDE_RECORD_BYTES
    }

    /// Serialize the batch to its fixed little-endian layout.
    pub fn to_bytes(&self) -> [u8; AMPLITUDE_RECORD_BYTES] {
        let mut bytes = [0u8; AMPLITUDE_RECORD_BYTES];
        let mut offset = 0;

        for &value in &self.amplitudes {
            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
            offset += 2;
        }
        for &value in &self.timestamps {
            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
            offset += 2;
        }

        bytes
    }

    /// Decode a batch record. Fails on any length other than
    /// [`AMPLITUDE_RECORD_BYTES`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NodeError> {
        if bytes.len() != AMPLITUDE_RECORD_BYTES {
            return Err(NodeError::MalformedRecord {
                expected: AMPLITUDE_RECORD_BYTES,
                actual: bytes.len(),
            });
        }

        let mut batch = Self {
            amplitudes: [0; AMPLITUDE_BATCH_LEN],
            timestamps: [0; AMPLITUDE_BATCH_LEN],
        };
        let mut offset = 0;

        for value in batch.amplitudes.iter_mut() {
            *value = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
            offset += 2;
        }
        for value in batch.timestamps.iter_mut() {
            *value = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
            offset += 2;
        }

        Ok(batch)
    }
}

/// Aggregate of the voiced pitch samples in one hour-long window.
///
/// `alert_threshold` is the configured alert level in effect when the
/// window flushed; `timestamp` is the coarse uptime at the window end. When
/// at least one sample contributed, `minimum <= average <= maximum`. A
/// window that closes with no voiced samples still flushes, carrying the
/// previous window's values.
///
/// Binary format (little-endian, 10 bytes):
/// - `average`: 2 bytes
/// - `minimum`: 2 bytes
/// - `maximum`: 2 bytes
/// - `alert_threshold`: 2 bytes
/// - `timestamp`: 2 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchAggregate {
    pub average: u16,
    pub minimum: u16,
    pub maximum: u16,
    pub alert_threshold: u16,
    pub timestamp: u16,
}

impl PitchAggregate {
    /// Encoded size in bytes.
    pub const fn size() -> usize {
        PITCH_RECORD_BYTES
    }

    /// Serialize the aggregate to its fixed little-endian layout.
    pub fn to_bytes(&self) -> [u8; PITCH_RECORD_BYTES] {
        let mut bytes = [0u8; PITCH_RECORD_BYTES];

        bytes[0..2].copy_from_slice(&self.average.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.minimum.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.maximum.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.alert_threshold.to_le_bytes());
        bytes[8..10].copy_from_slice(&self.timestamp.to_le_bytes());

        bytes
    }

    /// Decode an aggregate record. Fails on any length other than
    /// [`PITCH_RECORD_BYTES`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NodeError> {
        if bytes.len() != PITCH_RECORD_BYTES {
            return Err(NodeError::MalformedRecord {
                expected: PITCH_RECORD_BYTES,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            average: u16::from_le_bytes([bytes[0], bytes[1]]),
            minimum: u16::from_le_bytes([bytes[2], bytes[3]]),
            maximum: u16::from_le_bytes([bytes[4], bytes[5]]),
            alert_threshold: u16::from_le_bytes([bytes[6], bytes[7]]),
            timestamp: u16::from_le_bytes([bytes[8], bytes[9]]),
        })
    }
}
