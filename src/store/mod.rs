//! Record storage boundary.
//!
//! The node persists telemetry as small named records on block-erasable
//! media. This module defines the driver-facing [`BlockStore`] trait plus
//! the two backends that ship with the crate: an SD card store
//! ([`store::sd`](sd), feature `store-sd`) and an in-memory store for
//! host-side tests and simulators ([`store::mem`](mem)).

use core::fmt::{self, Write};

use thiserror_no_std::Error;

pub mod mem;
#[cfg(feature = "store-sd")]
pub mod sd;

pub use mem::MemRecordStore;
#[cfg(feature = "store-sd")]
pub use sd::SdRecordStore;

/// Maximum record name length. The SD backend stores records as 8.3 files,
/// so names are capped at eight characters.
pub const MAX_NAME_LEN: usize = 8;

/// Name of a record in the store's single flat namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordName(heapless::String<MAX_NAME_LEN>);

impl RecordName {
    /// Name for a ring slot: the decimal form of the absolute slot index.
    pub fn from_slot(slot: u16) -> Self {
        let mut inner = heapless::String::new();
        // Five digits at most, always within capacity.
        let _ = write!(inner, "{}", slot);
        Self(inner)
    }

    /// Reserved (non-slot) name, nonempty and at most [`MAX_NAME_LEN`]
    /// bytes. Keep these non-numeric so they can never collide with a slot
    /// name.
    pub fn reserved(name: &str) -> Self {
        assert!(!name.is_empty() && name.len() <= MAX_NAME_LEN);
        let mut inner = heapless::String::new();
        let _ = inner.push_str(name);
        Self(inner)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures reported by a record store backend.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The media is reachable but holds no recognizable filesystem.
    /// Startup formats once and mounts again; any other mount failure is
    /// fatal.
    #[error("no filesystem present")]
    NoFilesystem,

    /// No record exists under the requested name.
    #[error("record not found")]
    NotFound,

    /// The backend driver reported an I/O failure.
    #[error("backend I/O failure")]
    Io,

    /// The backend does not implement this operation.
    #[error("operation not supported by this backend")]
    Unsupported,
}

/// Access mode for [`BlockStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Synchronous record storage over erasable blocks.
///
/// One record per name, flat namespace, sequential read/write through an
/// explicit handle that must be closed. The telemetry log is the single
/// writer, so backends do not need internal locking.
pub trait BlockStore {
    /// Backend-specific open-record token.
    type Handle;

    /// Attaches to the media. [`StoreError::NoFilesystem`] means blank
    /// media and the caller may format and mount again; anything else is
    /// fatal.
    fn mount(&mut self) -> Result<(), StoreError>;

    /// Creates an empty filesystem, destroying existing records.
    fn format(&mut self) -> Result<(), StoreError>;

    /// Creates `name` fresh for writing. An existing record under the same
    /// name is replaced by an empty one.
    fn create(&mut self, name: &RecordName) -> Result<Self::Handle, StoreError>;

    /// Opens an existing record.
    fn open(&mut self, name: &RecordName, mode: OpenMode) -> Result<Self::Handle, StoreError>;

    /// Appends `bytes` at the record's write position, returning how many
    /// were written.
    fn write(&mut self, handle: &mut Self::Handle, bytes: &[u8]) -> Result<usize, StoreError>;

    /// Reads from the record's current position, returning how many bytes
    /// landed in `buf`. `Ok(0)` is end of record.
    fn read(&mut self, handle: &mut Self::Handle, buf: &mut [u8]) -> Result<usize, StoreError>;

    /// Removes the record under `name`.
    fn remove(&mut self, name: &RecordName) -> Result<(), StoreError>;

    /// Releases a handle. Backends flush any buffered state here.
    fn close(&mut self, handle: Self::Handle) -> Result<(), StoreError>;
}
