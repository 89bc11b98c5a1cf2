//! Slot ring allocation for the telemetry streams.

use crate::store::RecordName;

/// Allocates record slots for one telemetry stream, oldest-overwriting.
///
/// Slots are absolute indices in `[base, base + capacity)`. Streams sharing
/// one namespace stay collision-free by stacking their ranges: the second
/// stream's `base` is the first stream's `base + capacity`.
#[derive(Debug, Clone)]
pub struct SlotRing {
    base: u16,
    capacity: u16,
    /// Offset of the slot the next flush writes, in `[0, capacity)`.
    next: u16,
}

impl SlotRing {
    /// New ring over `capacity` slots starting at `base`.
    ///
    /// `capacity` must be nonzero and `base + capacity` must not exceed the
    /// `u16` slot space.
    pub const fn new(base: u16, capacity: u16) -> Self {
        assert!(capacity > 0);
        assert!(base as u32 + capacity as u32 <= u16::MAX as u32 + 1);
        Self {
            base,
            capacity,
            next: 0,
        }
    }

    /// Absolute index of the slot the next flush writes. Does not advance.
    pub const fn next_slot(&self) -> u16 {
        self.base + self.next
    }

    /// Record name for the slot the next flush writes. Does not advance.
    pub fn next_name(&self) -> RecordName {
        RecordName::from_slot(self.next_slot())
    }

    /// Moves to the following slot, wrapping at the end of the range.
    ///
    /// Call exactly once per successful flush, never on a failed one.
    pub fn advance(&mut self) {
        self.next = (self.next + 1) % self.capacity;
    }

    pub const fn base(&self) -> u16 {
        self.base
    }

    pub const fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Absolute slot indices in write order, starting at the slot that
    /// holds the oldest record once the ring has wrapped.
    pub fn slots_oldest_first(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.capacity)
            .map(move |i| self.base + ((self.next as u32 + i as u32) % self.capacity as u32) as u16)
    }
}
