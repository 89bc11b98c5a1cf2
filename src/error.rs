//! Error taxonomy for the node core.
//!
//! Startup faults (mount/format) are fatal and returned to the host so it
//! can decide what to do with the device. Everything the sampling loop can
//! hit at runtime is recoverable: the loop logs, counts, and carries on,
//! degraded where it must.

use thiserror_no_std::Error;

use crate::remote::Field;
use crate::store::StoreError;

/// Errors surfaced by the node core.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// The record store failed to mount and the failure was not the
    /// formattable "no filesystem" case. Fatal at startup.
    #[error("record store mount failed: {0}")]
    Mount(StoreError),

    /// Formatting blank media failed. Fatal at startup.
    #[error("record store format failed: {0}")]
    Format(StoreError),

    /// A record create, write, or close failed. The payload is the caller's
    /// to drop or retry; the ring slot stays targeted at the same record.
    #[error("record write failed: {0}")]
    StorageWrite(StoreError),

    /// A record open or read failed during a scan.
    #[error("record read failed: {0}")]
    StorageRead(StoreError),

    /// The stale record in a slot would not go away within the retry
    /// budget, so the append was abandoned.
    #[error("stale record not removed after {attempts} attempts: {cause}")]
    EvictionFailed { cause: StoreError, attempts: u8 },

    /// A stored record does not have the fixed length its codec requires.
    /// Readers skip such records; they never abort a scan.
    #[error("malformed record: expected {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    /// The haptic driver did not acknowledge a bus write. Alerts degrade
    /// to log-only until it recovers.
    #[error("haptic actuator unavailable")]
    ActuatorUnavailable,

    /// A remote write was rejected, either for a length mismatch or for
    /// targeting a read-only field. Node state is unchanged.
    #[error("rejected {len}-byte write to {field:?}")]
    InvalidConfigWrite { field: Field, len: usize },
}
