// THEORY:
// The frame-rate optimizer closes a small feedback loop: the presence verdict of
// the frame just processed chooses how long to wait before the next one. While
// somebody is known to be in the room there is no point sampling quickly, so the
// capture drops to the "eco" interval; otherwise it samples at the normal rate.
// With optimization off the camera runs at a fixed ~30 fps.

use crate::config::WardenConfig;
use std::time::Duration;

/// Capture interval when optimization is disabled (~30 fps).
pub const UNOPTIMIZED_INTERVAL: Duration = Duration::from_millis(33);

/// Anything that schedules frame captures at a settable interval.
pub trait CaptureScheduler {
    fn set_interval(&mut self, interval: Duration);
}

/// The interval the next capture should use, given the latest presence verdict.
pub fn capture_interval(config: &WardenConfig, presence_detected: bool) -> Duration {
    if !config.optical_load_optimize_enabled {
        return UNOPTIMIZED_INTERVAL;
    }
    if presence_detected {
        Duration::from_millis((config.eco_interval_sec * 1000.0) as u64)
    } else {
        Duration::from_millis(1000 / u64::from(config.normal_fps.max(1)))
    }
}

#[derive(Debug, Clone)]
pub struct FrameRateOptimizer {
    current: Duration,
}

impl Default for FrameRateOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRateOptimizer {
    pub fn new() -> Self {
        Self {
            current: UNOPTIMIZED_INTERVAL,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Re-evaluates the interval and touches the scheduler only when it changed.
    /// Returns the new interval if a reschedule happened.
    pub fn retune(
        &mut self,
        config: &WardenConfig,
        presence_detected: bool,
        scheduler: &mut impl CaptureScheduler,
    ) -> Option<Duration> {
        let wanted = capture_interval(config, presence_detected);
        if wanted == self.current {
            return None;
        }
        self.current = wanted;
        scheduler.set_interval(wanted);
        Some(wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingScheduler {
        calls: Vec<Duration>,
    }

    impl CaptureScheduler for RecordingScheduler {
        fn set_interval(&mut self, interval: Duration) {
            self.calls.push(interval);
        }
    }

    #[test]
    fn interval_follows_presence_when_optimizing() {
        let cfg = WardenConfig::default();
        assert_eq!(capture_interval(&cfg, false), Duration::from_millis(333));
        assert_eq!(capture_interval(&cfg, true), Duration::from_millis(2000));
    }

    #[test]
    fn interval_is_fixed_without_optimization() {
        let cfg = WardenConfig {
            optical_load_optimize_enabled: false,
            ..WardenConfig::default()
        };
        assert_eq!(capture_interval(&cfg, true), UNOPTIMIZED_INTERVAL);
        assert_eq!(capture_interval(&cfg, false), UNOPTIMIZED_INTERVAL);
    }

    #[test]
    fn eco_interval_truncates_to_whole_milliseconds() {
        let cfg = WardenConfig {
            eco_interval_sec: 1.2345,
            ..WardenConfig::default()
        };
        assert_eq!(capture_interval(&cfg, true), Duration::from_millis(1234));
    }

    #[test]
    fn scheduler_is_touched_only_on_change() {
        let cfg = WardenConfig::default();
        let mut optimizer = FrameRateOptimizer::new();
        let mut scheduler = RecordingScheduler::default();

        assert_eq!(
            optimizer.retune(&cfg, false, &mut scheduler),
            Some(Duration::from_millis(333))
        );
        assert_eq!(optimizer.retune(&cfg, false, &mut scheduler), None);
        assert_eq!(
            optimizer.retune(&cfg, true, &mut scheduler),
            Some(Duration::from_millis(2000))
        );
        assert_eq!(optimizer.retune(&cfg, true, &mut scheduler), None);

        assert_eq!(
            scheduler.calls,
            vec![Duration::from_millis(333), Duration::from_millis(2000)]
        );
    }
}
