//! Run/pause gate between the control-input edge handler and the sampling
//! loop.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Binary run/pause flip-flop with a saturating resume signal.
///
/// [`toggle`] runs in the edge handler's interrupt context, never blocks,
/// and must stay the only caller that mutates the flip-flop. The sampling
/// loop checks [`is_paused`] every cycle and parks on [`released`] while
/// paused.
///
/// The release is a single slot: repeated toggles before the loop wakes
/// cannot queue extra wake-ups, and a release left over from a toggle burst
/// is cleared when the next pause begins.
///
/// [`toggle`]: SampleGate::toggle
/// [`is_paused`]: SampleGate::is_paused
/// [`released`]: SampleGate::released
pub struct SampleGate {
    paused: AtomicBool,
    release: Signal<CriticalSectionRawMutex, ()>,
}

impl SampleGate {
    /// Gate in the running state, suitable for a `static`.
    pub const fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            release: Signal::new(),
        }
    }

    /// Flips between pause and run; on the run edge, posts one release.
    pub fn toggle(&self) {
        if self.paused.load(Ordering::Acquire) {
            self.paused.store(false, Ordering::Release);
            self.release.signal(());
        } else {
            self.release.reset();
            self.paused.store(true, Ordering::Release);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Waits for (and consumes) the next release.
    ///
    /// Callers re-check [`is_paused`] afterwards: a stale release wakes the
    /// loop once but cannot let it run while the gate is paused.
    ///
    /// [`is_paused`]: SampleGate::is_paused
    pub async fn released(&self) {
        self.release.wait().await;
    }
}

impl Default for SampleGate {
    fn default() -> Self {
        Self::new()
    }
}
