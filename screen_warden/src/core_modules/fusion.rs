// THEORY:
// Activation fusion is the once-per-second heartbeat. It folds four independent
// signals (motion, presence, media activity, human input) into one verdict,
// advances the idle and continuous-motion counters and asks the power state
// machine what, if anything, should happen.
//
// The order of operations inside `tick` is load-bearing:
// 1.  The continuous-motion counter is advanced *before* the wake check, so a
//     motion-triggered wake sees the current second.
// 2.  The wake check runs *before* the input latch is consumed.
// 3.  Input is consumed only on an active tick, so an inactive tick can never
//     swallow an event.
//
// All state lives in one owned `CoreState`; no singletons, no interior
// mutability beyond the input latch, which is shared with the listener thread.

use crate::config::WardenConfig;
use crate::core_modules::input_latch::InputLatch;
use crate::core_modules::power::{self, MonitorPower, PowerAction};
use std::time::Instant;
use tracing::{info, trace};

/// Latest value of each detection signal, as seen by the tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionState {
    pub motion_detected: bool,
    pub presence_detected: bool,
    pub video_active: bool,
    pub hid_active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingState {
    pub idle_seconds: u64,
    pub continuous_motion_seconds: u64,
    pub monitor: MonitorPower,
}

impl TimingState {
    pub fn monitor_off(&self) -> bool {
        self.monitor.is_off()
    }

    pub fn off_since(&self) -> Option<Instant> {
        self.monitor.off_since()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreState {
    pub detection: DetectionState,
    pub timing: TimingState,
    /// The master switch. While off, ticks are suspended.
    pub enabled: bool,
}

impl Default for CoreState {
    fn default() -> Self {
        Self {
            detection: DetectionState::default(),
            timing: TimingState::default(),
            enabled: true,
        }
    }
}

impl CoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the master switch. Disabling zeroes the idle counter and forgets frame signals.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.timing.idle_seconds = 0;
            self.timing.continuous_motion_seconds = 0;
            self.detection = DetectionState::default();
        }
    }
}

/// The outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub system_active: bool,
    pub can_wake_up: bool,
    pub action: PowerAction,
    pub idle_seconds: u64,
}

impl TickReport {
    fn suspended() -> Self {
        Self {
            system_active: false,
            can_wake_up: false,
            action: PowerAction::None,
            idle_seconds: 0,
        }
    }
}

/// Runs one fusion step. `state.detection` must already hold the latest motion,
/// presence and video flags; the input flag is read from `latch` here.
pub fn tick(
    state: &mut CoreState,
    config: &WardenConfig,
    latch: &InputLatch,
    now: Instant,
) -> TickReport {
    if !state.enabled {
        return TickReport::suspended();
    }

    let input = latch.observe();
    state.detection.hid_active = input.active;
    let detection = state.detection;
    let timing = &mut state.timing;

    let presence = config.reference_mode_enabled && detection.presence_detected;
    let system_active =
        detection.motion_detected || detection.hid_active || detection.video_active || presence;

    if detection.motion_detected {
        timing.continuous_motion_seconds += 1;
    } else {
        timing.continuous_motion_seconds = 0;
    }

    let can_wake_up = power::can_wake_up(
        &timing.monitor,
        config,
        detection.hid_active,
        detection.motion_detected,
        timing.continuous_motion_seconds,
        now,
    );

    let mut action = PowerAction::None;
    if system_active {
        timing.idle_seconds = 0;
        if timing.monitor.is_off() && can_wake_up && config.auto_on_enabled {
            let slept = timing.monitor.off_duration(now).unwrap_or_default();
            timing.monitor.wake();
            action = PowerAction::Wake;
            info!(
                slept_secs = slept.as_secs(),
                by_input = detection.hid_active,
                continuous_motion_secs = timing.continuous_motion_seconds,
                "waking monitor"
            );
        }
        latch.consume(input);
        state.detection.hid_active = false;
    } else {
        timing.idle_seconds += 1;
    }

    if power::should_power_off(&timing.monitor, config, timing.idle_seconds, detection.video_active) {
        timing.monitor.turn_off(now);
        action = PowerAction::MonitorOff;
        info!(idle_secs = timing.idle_seconds, "turning monitor off");
    }

    trace!(
        motion = detection.motion_detected,
        input = detection.hid_active,
        presence,
        video = detection.video_active,
        idle_secs = timing.idle_seconds,
        monitor_off = timing.monitor.is_off(),
        "tick"
    );

    TickReport {
        system_active,
        can_wake_up,
        action,
        idle_seconds: timing.idle_seconds,
    }
}
