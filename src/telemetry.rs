//! Flash-backed circular telemetry log.
//!
//! Two independent record streams share one flat namespace: amplitude
//! batches in slots `0..AMPLITUDE_SLOTS` and pitch aggregates in the range
//! stacked directly above. Each stream is a bounded ring with
//! overwrite-oldest retention: an append evicts whatever occupies the
//! target slot, writes a fresh record, and only then advances the ring.
//! The media can therefore never fill up; the log keeps exactly the newest
//! `capacity` records per stream.

use log::{info, warn};

use crate::config::StoredThresholds;
use crate::error::NodeError;
use crate::record::{AMPLITUDE_RECORD_BYTES, AmplitudeBatch, PitchAggregate};
use crate::ring::SlotRing;
use crate::store::{BlockStore, OpenMode, RecordName, StoreError};

/// Default amplitude stream capacity in records.
pub const AMPLITUDE_SLOTS: u16 = 64;

/// Default pitch stream capacity in records: one week of hourly windows.
pub const PITCH_SLOTS: u16 = 168;

/// Eviction attempts before an append gives up on its slot.
pub const EVICT_RETRY_LIMIT: u8 = 3;

/// Reserved record holding the persisted thresholds. Non-numeric, so it
/// can never collide with a slot name.
const THRESHOLD_RECORD: &str = "thr";

/// Upper bound for an encoded threshold record.
const THRESHOLD_BUF_BYTES: usize = 16;

/// Scan buffer: one byte longer than the largest record, so an oversized
/// record still decodes as malformed instead of silently truncating.
const SCAN_BUF_BYTES: usize = AMPLITUDE_RECORD_BYTES + 1;

/// Slot counts for the two streams.
///
/// The pitch range starts exactly where the amplitude range ends, so the
/// ranges are disjoint for every valid pair of capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLayout {
    pub amplitude_slots: u16,
    pub pitch_slots: u16,
}

impl StreamLayout {
    /// Layout with explicit capacities. Both must be nonzero and the
    /// combined range must fit the `u16` slot space.
    pub const fn new(amplitude_slots: u16, pitch_slots: u16) -> Self {
        assert!(amplitude_slots > 0 && pitch_slots > 0);
        assert!(amplitude_slots as u32 + pitch_slots as u32 <= u16::MAX as u32 + 1);
        Self {
            amplitude_slots,
            pitch_slots,
        }
    }
}

impl Default for StreamLayout {
    fn default() -> Self {
        Self::new(AMPLITUDE_SLOTS, PITCH_SLOTS)
    }
}

/// The telemetry log: owns the record store and both stream rings.
pub struct TelemetryLog<S: BlockStore> {
    store: S,
    amplitude: SlotRing,
    pitch: SlotRing,
}

impl<S: BlockStore> TelemetryLog<S> {
    /// Mounts the store and builds a log with the default layout.
    ///
    /// A mount that fails with "no filesystem" formats once and mounts
    /// again; any other mount or format failure is fatal and handed back
    /// to the host.
    pub fn mount(store: S) -> Result<Self, NodeError> {
        Self::mount_with_layout(store, StreamLayout::default())
    }

    /// Mounts with an explicit stream layout.
    pub fn mount_with_layout(mut store: S, layout: StreamLayout) -> Result<Self, NodeError> {
        match store.mount() {
            Ok(()) => {}
            Err(StoreError::NoFilesystem) => {
                info!("no filesystem on record store, formatting");
                store.format().map_err(NodeError::Format)?;
                store.mount().map_err(NodeError::Mount)?;
            }
            Err(e) => return Err(NodeError::Mount(e)),
        }

        Ok(Self {
            store,
            amplitude: SlotRing::new(0, layout.amplitude_slots),
            pitch: SlotRing::new(layout.amplitude_slots, layout.pitch_slots),
        })
    }

    /// Appends one full amplitude batch, evicting the oldest batch once
    /// the stream has wrapped.
    pub fn append_amplitude_batch(&mut self, batch: &AmplitudeBatch) -> Result<(), NodeError> {
        let bytes = batch.to_bytes();
        append_record(&mut self.store, &mut self.amplitude, &bytes)
    }

    /// Appends one pitch aggregate.
    pub fn append_pitch_aggregate(&mut self, aggregate: &PitchAggregate) -> Result<(), NodeError> {
        let bytes = aggregate.to_bytes();
        append_record(&mut self.store, &mut self.pitch, &bytes)
    }

    /// Reads retained amplitude batches oldest-first into `out`, returning
    /// how many decoded. Absent slots and malformed records are skipped.
    pub fn read_amplitude_batches(
        &mut self,
        out: &mut [AmplitudeBatch],
    ) -> Result<usize, NodeError> {
        let Self {
            store, amplitude, ..
        } = self;
        scan_stream(store, amplitude, out, AmplitudeBatch::from_bytes)
    }

    /// Reads retained pitch aggregates oldest-first into `out`.
    pub fn read_pitch_aggregates(
        &mut self,
        out: &mut [PitchAggregate],
    ) -> Result<usize, NodeError> {
        let Self { store, pitch, .. } = self;
        scan_stream(store, pitch, out, PitchAggregate::from_bytes)
    }

    /// Persists the thresholds in the reserved config record.
    pub fn save_thresholds(&mut self, thresholds: &StoredThresholds) -> Result<(), NodeError> {
        let mut buf = [0u8; THRESHOLD_BUF_BYTES];
        let bytes = postcard::to_slice(thresholds, &mut buf)
            .map_err(|_| NodeError::StorageWrite(StoreError::Io))?;
        write_named(&mut self.store, &RecordName::reserved(THRESHOLD_RECORD), bytes)
    }

    /// Loads persisted thresholds, if a readable config record exists.
    ///
    /// A missing or undecodable record is `Ok(None)`: the node then runs
    /// on defaults until the remote service configures it.
    pub fn load_thresholds(&mut self) -> Result<Option<StoredThresholds>, NodeError> {
        let name = RecordName::reserved(THRESHOLD_RECORD);
        let mut buf = [0u8; THRESHOLD_BUF_BYTES];
        match read_named(&mut self.store, &name, &mut buf)? {
            None => Ok(None),
            Some(n) => match postcard::from_bytes(&buf[..n]) {
                Ok(stored) => Ok(Some(stored)),
                Err(_) => {
                    warn!("stored thresholds are unreadable, keeping defaults");
                    Ok(None)
                }
            },
        }
    }

    /// Absolute slot the next amplitude append will write.
    pub fn amplitude_next_slot(&self) -> u16 {
        self.amplitude.next_slot()
    }

    /// Absolute slot the next pitch append will write.
    pub fn pitch_next_slot(&self) -> u16 {
        self.pitch.next_slot()
    }

    /// Direct access to the backend.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the backend for host-side maintenance. The ring
    /// positions are not adjusted for writes made this way.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

/// One append: evict whatever occupies the next slot, write the record
/// fresh, then advance the ring. The ring only advances on full success, so
/// a failed append retargets the same slot next time.
fn append_record<S: BlockStore>(
    store: &mut S,
    ring: &mut SlotRing,
    bytes: &[u8],
) -> Result<(), NodeError> {
    let name = ring.next_name();
    evict_stale(store, &name)?;
    write_named(store, &name, bytes)?;
    ring.advance();
    Ok(())
}

/// Removes the record occupying `name`, if any. Retries a refusing backend
/// up to [`EVICT_RETRY_LIMIT`] times before giving up.
fn evict_stale<S: BlockStore>(store: &mut S, name: &RecordName) -> Result<(), NodeError> {
    let mut attempts = 0;
    loop {
        match store.remove(name) {
            Ok(()) | Err(StoreError::NotFound) => return Ok(()),
            Err(cause) => {
                attempts += 1;
                if attempts >= EVICT_RETRY_LIMIT {
                    return Err(NodeError::EvictionFailed { cause, attempts });
                }
                warn!("slot {} eviction attempt {} failed: {}", name, attempts, cause);
            }
        }
    }
}

/// Creates `name` fresh and writes `bytes` in full.
fn write_named<S: BlockStore>(
    store: &mut S,
    name: &RecordName,
    bytes: &[u8],
) -> Result<(), NodeError> {
    let mut handle = store.create(name).map_err(NodeError::StorageWrite)?;
    match store.write(&mut handle, bytes) {
        Ok(n) if n == bytes.len() => {}
        Ok(_) => {
            let _ = store.close(handle);
            return Err(NodeError::StorageWrite(StoreError::Io));
        }
        Err(e) => {
            let _ = store.close(handle);
            return Err(NodeError::StorageWrite(e));
        }
    }
    store.close(handle).map_err(NodeError::StorageWrite)
}

/// Reads the record under `name` into `buf`, returning how many bytes it
/// held, or `None` when no record exists. Stops at `buf.len()`; oversized
/// records surface as a full buffer and fail decoding downstream.
fn read_named<S: BlockStore>(
    store: &mut S,
    name: &RecordName,
    buf: &mut [u8],
) -> Result<Option<usize>, NodeError> {
    let mut handle = match store.open(name, OpenMode::ReadOnly) {
        Ok(handle) => handle,
        Err(StoreError::NotFound) => return Ok(None),
        Err(e) => return Err(NodeError::StorageRead(e)),
    };

    let mut filled = 0;
    let result = loop {
        if filled == buf.len() {
            break Ok(filled);
        }
        match store.read(&mut handle, &mut buf[filled..]) {
            Ok(0) => break Ok(filled),
            Ok(n) => filled += n,
            Err(e) => break Err(NodeError::StorageRead(e)),
        }
    };
    let _ = store.close(handle);
    result.map(Some)
}

/// Walks a stream's slots oldest-first, decoding whatever is present.
fn scan_stream<S, T, F>(
    store: &mut S,
    ring: &SlotRing,
    out: &mut [T],
    decode: F,
) -> Result<usize, NodeError>
where
    S: BlockStore,
    F: Fn(&[u8]) -> Result<T, NodeError>,
{
    let mut count = 0;
    let mut buf = [0u8; SCAN_BUF_BYTES];

    for slot in ring.slots_oldest_first() {
        if count == out.len() {
            break;
        }
        let name = RecordName::from_slot(slot);
        let Some(n) = read_named(store, &name, &mut buf)? else {
            continue;
        };
        match decode(&buf[..n]) {
            Ok(value) => {
                out[count] = value;
                count += 1;
            }
            Err(_) => warn!("skipping malformed record in slot {}", slot),
        }
    }

    Ok(count)
}
