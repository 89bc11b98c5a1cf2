//! In-memory record store for host-side tests and simulators.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use super::{BlockStore, OpenMode, RecordName, StoreError};

/// Record store held in RAM.
///
/// Backs the telemetry log in host tests and simulator builds. [`new`]
/// starts with a filesystem in place; [`blank`] starts unformatted to
/// exercise the format-then-remount startup path. The `fail_*` counters
/// make the next N calls of the matching operation fail with
/// [`StoreError::Io`], for fault-path tests.
///
/// [`new`]: MemRecordStore::new
/// [`blank`]: MemRecordStore::blank
#[derive(Debug)]
pub struct MemRecordStore {
    records: BTreeMap<RecordName, Vec<u8>>,
    formatted: bool,
    mounted: bool,
    /// Fail the next N `remove` calls.
    pub fail_removes: u8,
    /// Fail the next N `create` calls.
    pub fail_creates: u8,
    /// Fail the next N `write` calls.
    pub fail_writes: u8,
}

impl MemRecordStore {
    /// Store with a filesystem already present.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            formatted: true,
            mounted: false,
            fail_removes: 0,
            fail_creates: 0,
            fail_writes: 0,
        }
    }

    /// Store on blank media; mounting fails with
    /// [`StoreError::NoFilesystem`] until the caller formats.
    pub fn blank() -> Self {
        Self {
            formatted: false,
            ..Self::new()
        }
    }

    /// Number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Whether a record exists under `name`.
    pub fn contains(&self, name: &RecordName) -> bool {
        self.records.contains_key(name)
    }

    fn take_fault(counter: &mut u8) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

impl Default for MemRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Open-record token for [`MemRecordStore`].
#[derive(Debug)]
pub struct MemHandle {
    name: RecordName,
    pos: usize,
    mode: OpenMode,
}

impl BlockStore for MemRecordStore {
    type Handle = MemHandle;

    fn mount(&mut self) -> Result<(), StoreError> {
        if !self.formatted {
            return Err(StoreError::NoFilesystem);
        }
        self.mounted = true;
        Ok(())
    }

    fn format(&mut self) -> Result<(), StoreError> {
        self.records.clear();
        self.formatted = true;
        Ok(())
    }

    fn create(&mut self, name: &RecordName) -> Result<MemHandle, StoreError> {
        if !self.mounted {
            return Err(StoreError::Io);
        }
        if Self::take_fault(&mut self.fail_creates) {
            return Err(StoreError::Io);
        }
        self.records.insert(name.clone(), Vec::new());
        Ok(MemHandle {
            name: name.clone(),
            pos: 0,
            mode: OpenMode::ReadWrite,
        })
    }

    fn open(&mut self, name: &RecordName, mode: OpenMode) -> Result<MemHandle, StoreError> {
        if !self.mounted {
            return Err(StoreError::Io);
        }
        if !self.records.contains_key(name) {
            return Err(StoreError::NotFound);
        }
        Ok(MemHandle {
            name: name.clone(),
            pos: 0,
            mode,
        })
    }

    fn write(&mut self, handle: &mut MemHandle, bytes: &[u8]) -> Result<usize, StoreError> {
        if Self::take_fault(&mut self.fail_writes) {
            return Err(StoreError::Io);
        }
        if handle.mode != OpenMode::ReadWrite {
            return Err(StoreError::Io);
        }
        let record = self.records.get_mut(&handle.name).ok_or(StoreError::NotFound)?;
        record.extend_from_slice(bytes);
        handle.pos = record.len();
        Ok(bytes.len())
    }

    fn read(&mut self, handle: &mut MemHandle, buf: &mut [u8]) -> Result<usize, StoreError> {
        let record = self.records.get(&handle.name).ok_or(StoreError::NotFound)?;
        let remaining = record.len().saturating_sub(handle.pos);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&record[handle.pos..handle.pos + n]);
        handle.pos += n;
        Ok(n)
    }

    fn remove(&mut self, name: &RecordName) -> Result<(), StoreError> {
        if !self.mounted {
            return Err(StoreError::Io);
        }
        if Self::take_fault(&mut self.fail_removes) {
            return Err(StoreError::Io);
        }
        self.records.remove(name).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn close(&mut self, _handle: MemHandle) -> Result<(), StoreError> {
        Ok(())
    }
}
