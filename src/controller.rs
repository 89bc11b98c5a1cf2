//! Sampling and aggregation controller.
//!
//! One cycle per second: read the amplitude channel, classify the sample
//! against the remote-tunable thresholds, fold voiced pitch into the hourly
//! window, batch above-alert amplitudes toward flash, and pulse the haptic
//! actuator on alerts. The loop owns all per-cycle state; the gate,
//! thresholds, and status cell are shared with the interrupt and radio
//! contexts and borrowed.

use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use log::{debug, error, info};

use crate::actuator::Haptic;
use crate::config::{NodeStatus, ThresholdConfig};
use crate::gate::SampleGate;
use crate::record::{AMPLITUDE_BATCH_LEN, AmplitudeBatch, AmplitudeSample, PitchAggregate};
use crate::stats::PitchStats;
use crate::store::BlockStore;
use crate::telemetry::TelemetryLog;

/// Platform tick rate reported by the [`TickSource`] (10 us ticks).
pub const TICK_HZ: u32 = 100_000;

/// Microseconds per platform tick.
const TICK_PERIOD_US: u32 = 1_000_000 / TICK_HZ;

/// One sampling cycle: one second.
pub const CYCLE_TICKS: u32 = TICK_HZ;

/// The pitch aggregation window: one hour.
pub const WINDOW_TICKS: u32 = 3_600 * TICK_HZ;

/// Single-shot conversions on the two analog front-end channels.
///
/// Reads block for the conversion and are only ever made from the sampling
/// loop.
pub trait VoiceAdc {
    /// Sound pressure level on the amplitude channel.
    fn read_amplitude(&mut self) -> u16;

    /// Fundamental frequency estimate on the pitch channel.
    fn read_pitch(&mut self) -> u16;
}

/// Monotonic platform tick counter at [`TICK_HZ`], wrapping at `u32`.
pub trait TickSource {
    fn ticks(&self) -> u32;
}

/// Coarse record timestamp: whole seconds since boot, truncated to `u16`.
fn coarse_stamp(now: u32) -> u16 {
    (now / TICK_HZ) as u16
}

/// What one sampling cycle observed and did.
///
/// Everything here is also logged; the report exists for host-side display
/// and for driving the loop deterministically in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub amplitude: u16,
    /// Pitch reading, when the sample was voiced.
    pub pitch: Option<u16>,
    /// The amplitude exceeded the alert threshold.
    pub alerted: bool,
    /// The haptic pulse was delivered.
    pub pulsed: bool,
    pub batch_flushed: bool,
    pub aggregate_flushed: bool,
}

/// The sampling state machine.
pub struct SamplerController<'a, A, H, S, C>
where
    A: VoiceAdc,
    H: Haptic,
    S: BlockStore,
    C: TickSource,
{
    adc: A,
    haptic: H,
    telemetry: TelemetryLog<S>,
    clock: C,
    gate: &'a SampleGate,
    thresholds: &'a ThresholdConfig,
    status: &'a NodeStatus,
    stats: PitchStats,
    /// Values the last flush reported; reused when a window closes empty.
    last_window: (u16, u16, u16),
    window_start: u32,
    batch: Vec<AmplitudeSample, AMPLITUDE_BATCH_LEN>,
    flush_failures: u32,
    actuator_failures: u32,
}

impl<'a, A, H, S, C> SamplerController<'a, A, H, S, C>
where
    A: VoiceAdc,
    H: Haptic,
    S: BlockStore,
    C: TickSource,
{
    /// Builds the controller around a mounted telemetry log. The first
    /// aggregation window starts at the clock's current tick.
    pub fn new(
        adc: A,
        haptic: H,
        telemetry: TelemetryLog<S>,
        clock: C,
        gate: &'a SampleGate,
        thresholds: &'a ThresholdConfig,
        status: &'a NodeStatus,
    ) -> Self {
        let window_start = clock.ticks();
        Self {
            adc,
            haptic,
            telemetry,
            clock,
            gate,
            thresholds,
            status,
            stats: PitchStats::new(),
            last_window: (0, 0, 0),
            window_start,
            batch: Vec::new(),
            flush_failures: 0,
            actuator_failures: 0,
        }
    }

    /// Drives the sampling loop forever.
    ///
    /// While paused by the gate the loop does no sampling and no I/O; the
    /// window and batch state carry across pause/resume untouched. Each
    /// running cycle is paced to [`CYCLE_TICKS`] from the cycle's start, so
    /// time spent on storage or the bus shortens the idle wait rather than
    /// stretching the cadence.
    pub async fn run<D: DelayNs>(&mut self, delay: &mut D) {
        info!("sampling loop started");
        loop {
            while self.gate.is_paused() {
                self.gate.released().await;
            }

            let started = self.clock.ticks();
            self.run_cycle(started);

            let elapsed = self.clock.ticks().wrapping_sub(started);
            if elapsed < CYCLE_TICKS {
                delay.delay_us((CYCLE_TICKS - elapsed) * TICK_PERIOD_US).await;
            }
        }
    }

    /// Executes one sampling cycle at tick `now`.
    pub fn run_cycle(&mut self, now: u32) -> CycleReport {
        let amplitude = self.adc.read_amplitude();
        // One atomic load per threshold per cycle; a remote update lands on
        // the next cycle at the latest.
        let noise_threshold = self.thresholds.noise_threshold();
        let alert_threshold = self.thresholds.alert_threshold();

        let mut report = CycleReport {
            amplitude,
            ..CycleReport::default()
        };

        if amplitude > noise_threshold {
            let pitch = self.adc.read_pitch();
            self.stats.record(pitch);
            report.pitch = Some(pitch);
        }

        if now.wrapping_sub(self.window_start) > WINDOW_TICKS {
            report.aggregate_flushed = self.flush_window(now, alert_threshold);
        }

        if amplitude > alert_threshold {
            report.alerted = true;
            let sample = AmplitudeSample {
                amplitude,
                timestamp: coarse_stamp(now),
            };
            // The buffer is drained the moment it fills, so this push
            // cannot overflow.
            let _ = self.batch.push(sample);
            if self.batch.is_full() {
                report.batch_flushed = self.flush_batch();
            }

            // The pulse fires on every alert cycle, flush or not.
            match self.haptic.pulse() {
                Ok(()) => report.pulsed = true,
                Err(e) => {
                    self.actuator_failures += 1;
                    error!("haptic pulse failed, alert is log-only: {}", e);
                }
            }
        }

        if self.thresholds.take_dirty() {
            if let Err(e) = self.telemetry.save_thresholds(&self.thresholds.snapshot()) {
                self.thresholds.mark_dirty();
                error!("failed to persist thresholds, retrying next cycle: {}", e);
            }
        }

        let (average, minimum, maximum) = self.window_values();
        self.status.publish(amplitude, average, minimum, maximum);
        debug!("cycle: amplitude={} pitch={:?}", amplitude, report.pitch);

        report
    }

    /// Closes the aggregation window: persists one aggregate and starts the
    /// next window. The window state resets whether or not the append
    /// succeeded, so a storage fault costs one aggregate, not the cadence.
    fn flush_window(&mut self, now: u32, alert_threshold: u16) -> bool {
        let (average, minimum, maximum) = self.window_values();
        let aggregate = PitchAggregate {
            average,
            minimum,
            maximum,
            alert_threshold,
            timestamp: coarse_stamp(now),
        };

        let flushed = match self.telemetry.append_pitch_aggregate(&aggregate) {
            Ok(()) => {
                info!(
                    "pitch aggregate flushed: avg={} min={} max={}",
                    average, minimum, maximum
                );
                true
            }
            Err(e) => {
                self.flush_failures += 1;
                error!("pitch aggregate lost: {}", e);
                false
            }
        };

        self.last_window = (average, minimum, maximum);
        self.stats.reset();
        self.window_start = now;
        flushed
    }

    /// Persists the filled batch buffer. The buffer empties either way; a
    /// failed append drops the batch rather than stalling the loop.
    fn flush_batch(&mut self) -> bool {
        let Some(batch) = AmplitudeBatch::from_samples(&self.batch) else {
            return false;
        };
        let flushed = match self.telemetry.append_amplitude_batch(&batch) {
            Ok(()) => {
                info!("amplitude batch flushed ({} samples)", AMPLITUDE_BATCH_LEN);
                true
            }
            Err(e) => {
                self.flush_failures += 1;
                error!("amplitude batch dropped: {}", e);
                false
            }
        };
        self.batch.clear();
        flushed
    }

    /// Average, minimum, and maximum for the current window. An empty
    /// window falls back to the previous window's values, all zero before
    /// the first voiced sample after boot.
    fn window_values(&self) -> (u16, u16, u16) {
        self.stats.snapshot().unwrap_or(self.last_window)
    }

    /// Running stats of the current window.
    pub fn pitch_stats(&self) -> &PitchStats {
        &self.stats
    }

    /// Alert samples buffered toward the next batch flush.
    pub fn pending_alert_samples(&self) -> usize {
        self.batch.len()
    }

    /// Appends dropped because storage refused them.
    pub fn flush_failures(&self) -> u32 {
        self.flush_failures
    }

    /// Alert pulses the actuator did not acknowledge.
    pub fn actuator_failures(&self) -> u32 {
        self.actuator_failures
    }

    pub fn telemetry(&self) -> &TelemetryLog<S> {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryLog<S> {
        &mut self.telemetry
    }
}
