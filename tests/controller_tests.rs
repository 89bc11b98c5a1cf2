//! End-to-end sampling cycles driven against the in-memory record store.

use phon_rs::actuator::Haptic;
use phon_rs::config::{NodeStatus, StoredThresholds, ThresholdConfig};
use phon_rs::controller::{SamplerController, TICK_HZ, TickSource, VoiceAdc, WINDOW_TICKS};
use phon_rs::error::NodeError;
use phon_rs::gate::SampleGate;
use phon_rs::record::{AMPLITUDE_BATCH_LEN, AmplitudeBatch, PitchAggregate};
use phon_rs::remote::{AttributeService, Field};
use phon_rs::store::MemRecordStore;
use phon_rs::telemetry::TelemetryLog;

/// Replays scripted readings; repeats the last value once the script runs
/// dry.
struct ScriptedAdc {
    amplitudes: Vec<u16>,
    pitches: Vec<u16>,
    amplitude_at: usize,
    pitch_at: usize,
}

impl ScriptedAdc {
    fn new(amplitudes: &[u16], pitches: &[u16]) -> Self {
        Self {
            amplitudes: amplitudes.to_vec(),
            pitches: pitches.to_vec(),
            amplitude_at: 0,
            pitch_at: 0,
        }
    }
}

impl VoiceAdc for ScriptedAdc {
    fn read_amplitude(&mut self) -> u16 {
        let i = self.amplitude_at.min(self.amplitudes.len() - 1);
        self.amplitude_at += 1;
        self.amplitudes[i]
    }

    fn read_pitch(&mut self) -> u16 {
        let i = self.pitch_at.min(self.pitches.len() - 1);
        self.pitch_at += 1;
        self.pitches[i]
    }
}

struct PulseCounter {
    fail: bool,
}

impl Haptic for PulseCounter {
    fn pulse(&mut self) -> Result<(), NodeError> {
        if self.fail {
            Err(NodeError::ActuatorUnavailable)
        } else {
            Ok(())
        }
    }
}

struct ZeroClock;

impl TickSource for ZeroClock {
    fn ticks(&self) -> u32 {
        0
    }
}

fn empty_batch() -> AmplitudeBatch {
    AmplitudeBatch {
        amplitudes: [0; AMPLITUDE_BATCH_LEN],
        timestamps: [0; AMPLITUDE_BATCH_LEN],
    }
}

fn empty_aggregate() -> PitchAggregate {
    PitchAggregate {
        average: 0,
        minimum: 0,
        maximum: 0,
        alert_threshold: 0,
        timestamp: 0,
    }
}

#[test]
fn classification_follows_the_thresholds() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    thresholds.restore(&StoredThresholds {
        noise: 50,
        alert: 80,
    });

    let adc = ScriptedAdc::new(&[40, 60, 90], &[150, 180]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    let quiet = controller.run_cycle(0);
    assert_eq!(quiet.amplitude, 40);
    assert_eq!(quiet.pitch, None);
    assert!(!quiet.alerted);
    assert!(!quiet.pulsed);

    let voiced = controller.run_cycle(1);
    assert_eq!(voiced.pitch, Some(150));
    assert!(!voiced.alerted);

    let loud = controller.run_cycle(2);
    assert_eq!(loud.pitch, Some(180));
    assert!(loud.alerted);
    assert!(loud.pulsed);

    assert_eq!(controller.pending_alert_samples(), 1);
    assert_eq!(controller.pitch_stats().count(), 2);
    assert_eq!(controller.pitch_stats().snapshot(), Some((165, 150, 180)));
    assert_eq!(status.amplitude(), 90);
}

#[test]
fn batch_flushes_when_full() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    thresholds.restore(&StoredThresholds {
        noise: 50,
        alert: 80,
    });

    let adc = ScriptedAdc::new(&[100], &[200]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    for i in 0..AMPLITUDE_BATCH_LEN - 1 {
        let report = controller.run_cycle(i as u32);
        assert!(report.alerted);
        assert!(!report.batch_flushed);
    }
    assert_eq!(controller.pending_alert_samples(), AMPLITUDE_BATCH_LEN - 1);

    let last = controller.run_cycle((AMPLITUDE_BATCH_LEN - 1) as u32);
    assert!(last.batch_flushed);
    assert_eq!(controller.pending_alert_samples(), 0);

    let mut out = [empty_batch(); 2];
    let count = controller.telemetry_mut().read_amplitude_batches(&mut out).unwrap();
    assert_eq!(count, 1);
    assert_eq!(out[0].amplitudes, [100; AMPLITUDE_BATCH_LEN]);
    // All 32 cycles happened within the first uptime second.
    assert_eq!(out[0].timestamps, [0; AMPLITUDE_BATCH_LEN]);
}

#[test]
fn window_flush_writes_an_aggregate() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    thresholds.restore(&StoredThresholds {
        noise: 50,
        alert: 80,
    });

    let adc = ScriptedAdc::new(&[60, 60, 60, 10], &[10, 3, 7]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    for now in 0..3 {
        assert!(controller.run_cycle(now).pitch.is_some());
    }

    let report = controller.run_cycle(WINDOW_TICKS + 1);
    assert!(report.aggregate_flushed);
    assert!(controller.pitch_stats().is_empty());

    let mut out = [empty_aggregate(); 2];
    let count = controller.telemetry_mut().read_pitch_aggregates(&mut out).unwrap();
    assert_eq!(count, 1);
    assert_eq!(
        out[0],
        PitchAggregate {
            average: 6,
            minimum: 3,
            maximum: 10,
            alert_threshold: 80,
            timestamp: ((WINDOW_TICKS + 1) / TICK_HZ) as u16,
        }
    );
}

#[test]
fn empty_window_repeats_the_last_values() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    thresholds.restore(&StoredThresholds {
        noise: 50,
        alert: 80,
    });

    let adc = ScriptedAdc::new(&[10, 60, 60, 60, 10], &[10, 3, 7]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    // No voiced sample has ever arrived: the first flush carries zeros.
    let report = controller.run_cycle(WINDOW_TICKS + 1);
    assert!(report.aggregate_flushed);

    for offset in 2..5 {
        controller.run_cycle(WINDOW_TICKS + offset);
    }
    controller.run_cycle(2 * WINDOW_TICKS + 2);

    // Nothing voiced since; the third flush repeats the second's values.
    controller.run_cycle(3 * WINDOW_TICKS + 3);

    let mut out = [empty_aggregate(); 4];
    let count = controller.telemetry_mut().read_pitch_aggregates(&mut out).unwrap();
    assert_eq!(count, 3);

    assert_eq!((out[0].average, out[0].minimum, out[0].maximum), (0, 0, 0));
    assert_eq!((out[1].average, out[1].minimum, out[1].maximum), (6, 3, 10));
    assert_eq!((out[2].average, out[2].minimum, out[2].maximum), (6, 3, 10));
    assert_eq!(out[2].timestamp, ((3 * WINDOW_TICKS + 3) / TICK_HZ) as u16);
}

#[test]
fn pause_and_resume_preserve_window_state() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    thresholds.restore(&StoredThresholds {
        noise: 50,
        alert: 200,
    });

    let adc = ScriptedAdc::new(&[60], &[100, 120, 140]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    controller.run_cycle(0);
    controller.run_cycle(1);
    let before = *controller.pitch_stats();

    gate.toggle();
    assert!(gate.is_paused());
    gate.toggle();
    assert!(!gate.is_paused());

    assert_eq!(*controller.pitch_stats(), before);

    // The next voiced cycle keeps accumulating into the same window.
    controller.run_cycle(2);
    assert_eq!(controller.pitch_stats().count(), 3);
    assert_eq!(controller.pitch_stats().snapshot(), Some((120, 100, 140)));
}

#[test]
fn actuator_failure_keeps_the_loop_running() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    thresholds.restore(&StoredThresholds {
        noise: 50,
        alert: 80,
    });

    let adc = ScriptedAdc::new(&[100], &[200]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: true },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    let report = controller.run_cycle(0);
    assert!(report.alerted);
    assert!(!report.pulsed);
    assert_eq!(controller.actuator_failures(), 1);

    // The sample was still logged and the loop carries on.
    assert_eq!(controller.pending_alert_samples(), 1);
    let next = controller.run_cycle(1);
    assert!(next.alerted);
    assert_eq!(controller.pending_alert_samples(), 2);
    assert_eq!(controller.actuator_failures(), 2);
}

#[test]
fn storage_failure_drops_the_batch_and_retargets_the_slot() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    thresholds.restore(&StoredThresholds {
        noise: 50,
        alert: 80,
    });

    let adc = ScriptedAdc::new(&[100], &[200]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    for i in 0..AMPLITUDE_BATCH_LEN - 1 {
        controller.run_cycle(i as u32);
    }
    controller.telemetry_mut().store_mut().fail_creates = 1;

    let report = controller.run_cycle((AMPLITUDE_BATCH_LEN - 1) as u32);
    assert!(!report.batch_flushed);
    assert_eq!(controller.flush_failures(), 1);
    assert_eq!(controller.pending_alert_samples(), 0);
    assert_eq!(controller.telemetry().amplitude_next_slot(), 0);

    // The fault cleared; the next full batch lands in the same slot.
    for i in 0..AMPLITUDE_BATCH_LEN {
        controller.run_cycle(i as u32);
    }
    assert_eq!(controller.telemetry().amplitude_next_slot(), 1);
    assert_eq!(controller.telemetry().store().record_count(), 1);
}

#[test]
fn remote_writes_reach_the_loop_and_flash() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    let service = AttributeService::new(&thresholds, &status);

    let adc = ScriptedAdc::new(&[60], &[150]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    service
        .write(Field::NoiseThreshold, &50u16.to_le_bytes())
        .unwrap();
    service
        .write(Field::AlertThreshold, &80u16.to_le_bytes())
        .unwrap();

    // Voiced but below alert under the new thresholds.
    let report = controller.run_cycle(0);
    assert_eq!(report.pitch, Some(150));
    assert!(!report.alerted);

    // The same cycle persisted the dirty thresholds.
    let stored = controller.telemetry_mut().load_thresholds().unwrap();
    assert_eq!(
        stored,
        Some(StoredThresholds {
            noise: 50,
            alert: 80,
        })
    );
}

#[test]
fn threshold_save_survives_a_transient_storage_fault() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();

    // Silent input: the only record written is the threshold save.
    let adc = ScriptedAdc::new(&[0], &[0]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    thresholds.set_noise_threshold(60);
    controller.telemetry_mut().store_mut().fail_creates = 1;

    // The save fails this cycle; nothing reached flash yet.
    controller.run_cycle(0);
    assert_eq!(controller.telemetry_mut().load_thresholds().unwrap(), None);

    // The pair stayed dirty, so the next healthy cycle lands the record.
    controller.run_cycle(1);
    assert_eq!(
        controller.telemetry_mut().load_thresholds().unwrap(),
        Some(StoredThresholds {
            noise: 60,
            alert: 0,
        })
    );
}

#[test]
fn status_field_reflects_the_last_cycle() {
    let gate = SampleGate::new();
    let thresholds = ThresholdConfig::new();
    let status = NodeStatus::new();
    thresholds.restore(&StoredThresholds {
        noise: 50,
        alert: 80,
    });

    let adc = ScriptedAdc::new(&[90], &[150, 180]);
    let log = TelemetryLog::mount(MemRecordStore::new()).unwrap();
    let mut controller = SamplerController::new(
        adc,
        PulseCounter { fail: false },
        log,
        ZeroClock,
        &gate,
        &thresholds,
        &status,
    );

    controller.run_cycle(0);
    controller.run_cycle(1);

    let service = AttributeService::new(&thresholds, &status);
    let mut out = [0u8; 8];
    assert_eq!(service.read(Field::Status, &mut out), 8);

    let words: Vec<u16> = out
        .chunks(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(words, [90, 165, 150, 180]);
}
