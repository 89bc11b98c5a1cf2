//! Remote configuration surface.
//!
//! Models the attribute-exchange boundary a radio stack drives: three
//! fixed-length fields, exact-length validation on writes, a callback on
//! every accepted write. Transport concerns (connections, MTU, security)
//! belong to the stack and stay outside this crate.

use log::{debug, warn};

use crate::config::{NodeStatus, ThresholdConfig};
use crate::error::NodeError;

/// Attribute fields exposed to the remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Voicing floor, writable, 2 bytes little-endian.
    NoiseThreshold,
    /// Alert level, writable, 2 bytes little-endian.
    AlertThreshold,
    /// Live readings, read-only, 8 bytes.
    Status,
}

impl Field {
    /// Exact value size in bytes. Writes of any other length are rejected.
    pub const fn size(self) -> usize {
        match self {
            Field::NoiseThreshold | Field::AlertThreshold => 2,
            Field::Status => NodeStatus::BYTES,
        }
    }

    /// Whether the remote peer may write this field.
    pub const fn writable(self) -> bool {
        !matches!(self, Field::Status)
    }
}

/// Invoked after every accepted write with the field and the raw bytes.
pub type WriteCallback = fn(Field, &[u8]);

/// Validation and dispatch for the remote configuration fields.
pub struct AttributeService<'a> {
    thresholds: &'a ThresholdConfig,
    status: &'a NodeStatus,
    on_write: Option<WriteCallback>,
}

impl<'a> AttributeService<'a> {
    pub fn new(thresholds: &'a ThresholdConfig, status: &'a NodeStatus) -> Self {
        Self {
            thresholds,
            status,
            on_write: None,
        }
    }

    /// Registers the accepted-write callback. Call once at bring-up.
    pub fn on_write(mut self, callback: WriteCallback) -> Self {
        self.on_write = Some(callback);
        self
    }

    /// Applies a remote write.
    ///
    /// Only writable fields accept writes, and only at their exact size;
    /// anything else is rejected with node state unchanged.
    pub fn write(&self, field: Field, bytes: &[u8]) -> Result<(), NodeError> {
        match field {
            Field::NoiseThreshold if bytes.len() == field.size() => {
                let value = u16::from_le_bytes([bytes[0], bytes[1]]);
                self.thresholds.set_noise_threshold(value);
                debug!("noise threshold set to {}", value);
            }
            Field::AlertThreshold if bytes.len() == field.size() => {
                let value = u16::from_le_bytes([bytes[0], bytes[1]]);
                self.thresholds.set_alert_threshold(value);
                debug!("alert threshold set to {}", value);
            }
            _ => {
                warn!("rejected {}-byte write to {:?}", bytes.len(), field);
                return Err(NodeError::InvalidConfigWrite {
                    field,
                    len: bytes.len(),
                });
            }
        }

        if let Some(callback) = self.on_write {
            callback(field, bytes);
        }
        Ok(())
    }

    /// Reads a field value into `out`, returning how many bytes were
    /// copied. Shorter buffers receive a prefix; remote reads may be
    /// chunked.
    pub fn read(&self, field: Field, out: &mut [u8]) -> usize {
        match field {
            Field::NoiseThreshold => {
                copy_prefix(out, &self.thresholds.noise_threshold().to_le_bytes())
            }
            Field::AlertThreshold => {
                copy_prefix(out, &self.thresholds.alert_threshold().to_le_bytes())
            }
            Field::Status => copy_prefix(out, &self.status.encode()),
        }
    }
}

fn copy_prefix(out: &mut [u8], value: &[u8]) -> usize {
    let n = out.len().min(value.len());
    out[..n].copy_from_slice(&value[..n]);
    n
}
