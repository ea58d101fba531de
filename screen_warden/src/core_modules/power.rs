// THEORY:
// The power state machine has two states and two guarded transitions.
//
// 1.  **ON -> OFF** fires when auto-off is enabled, the idle counter has reached the
//     timeout and no external media activity is flagged. Media activity is a hard
//     veto: it can keep the screen on, but it can never turn it back on.
// 2.  **OFF -> ON** ("wake") is gated by `can_wake_up`. Human input always
//     qualifies. Motion qualifies immediately after a short sleep; after a long
//     sleep (smart wake) it must be sustained for a configured number of seconds.
//     This hysteresis rejects a cat walking past a dark screen at 3 a.m.
//
// The machine only decides; executing the resulting `PowerAction` is the caller's
// business.

use crate::config::WardenConfig;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorPower {
    #[default]
    On,
    Off {
        since: Instant,
    },
}

/// What the OS layer should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    None,
    MonitorOff,
    Wake,
}

impl MonitorPower {
    pub fn is_off(&self) -> bool {
        matches!(self, MonitorPower::Off { .. })
    }

    pub fn off_since(&self) -> Option<Instant> {
        match self {
            MonitorPower::On => None,
            MonitorPower::Off { since } => Some(*since),
        }
    }

    pub fn off_duration(&self, now: Instant) -> Option<Duration> {
        self.off_since().map(|since| now.saturating_duration_since(since))
    }

    pub fn turn_off(&mut self, now: Instant) {
        *self = MonitorPower::Off { since: now };
    }

    pub fn wake(&mut self) {
        *self = MonitorPower::On;
    }
}

/// Whether the current signals are allowed to wake a monitor that is off.
pub fn can_wake_up(
    power: &MonitorPower,
    config: &WardenConfig,
    hid_active: bool,
    motion_detected: bool,
    continuous_motion_seconds: u64,
    now: Instant,
) -> bool {
    let Some(off_for) = power.off_duration(now) else {
        return false;
    };
    if hid_active {
        return true;
    }
    if !motion_detected {
        return false;
    }
    if !config.smart_wake_enabled {
        return true;
    }
    let stale_after = Duration::from_secs(u64::from(config.smart_wake_stale_minutes) * 60);
    off_for <= stale_after || continuous_motion_seconds >= u64::from(config.smart_wake_motion_sec)
}

/// Whether the idle timeout has been reached with nothing vetoing power-down.
pub fn should_power_off(
    power: &MonitorPower,
    config: &WardenConfig,
    idle_seconds: u64,
    video_active: bool,
) -> bool {
    config.auto_off_enabled
        && idle_seconds >= u64::from(config.idle_timeout_sec)
        && !video_active
        && !power.is_off()
}
