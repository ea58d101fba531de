// THEORY:
// The `MotionDetector` answers one question per frame: "did something move?"
//
// Key architectural principles:
// 1.  **Running Background**: It keeps an exponential moving average of every blurred
//     gray frame it has seen. The average is the detector's entire memory; it is
//     seeded by the first frame and then blended with every frame after that.
// 2.  **Differencing**: A frame is compared against the background *after* it has
//     been blended in, exactly like a weighted accumulator followed by an absolute
//     difference. Pixels whose delta exceeds a fixed level are counted, and the
//     binarized sum is compared against a fixed budget.
// 3.  **Rate Independence (accepted limitation)**: The detector is fed at whatever
//     rate the frame-rate optimizer picks. When frames are sparse the background
//     lags further behind, which is accepted.
//
// The thresholds are absolute pixel sums and therefore tied to the capture
// resolution; see `DetectionThresholds`.

use crate::config::DetectionThresholds;
use crate::core_modules::frame::{GrayFrame, binarized_sum};
use tracing::debug;

/// Blend weight of the newest frame in the running background.
pub const BACKGROUND_ALPHA: f32 = 0.5;

/// Floating-point exponential moving average of blurred gray frames.
#[derive(Debug, Clone)]
pub struct RunningBackground {
    width: u32,
    height: u32,
    average: Vec<f32>,
}

impl RunningBackground {
    fn seed(frame: &GrayFrame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            average: frame.pixels().iter().map(|&p| p as f32).collect(),
        }
    }

    fn accumulate(&mut self, frame: &GrayFrame, alpha: f32) {
        for (avg, &px) in self.average.iter_mut().zip(frame.pixels()) {
            *avg = alpha * px as f32 + (1.0 - alpha) * *avg;
        }
    }

    fn matches(&self, frame: &GrayFrame) -> bool {
        self.width == frame.width() && self.height == frame.height()
    }

    /// The background rounded and saturated back to 8 bits.
    pub fn as_u8(&self) -> impl Iterator<Item = u8> + '_ {
        self.average.iter().map(|v| v.round().clamp(0.0, 255.0) as u8)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MotionDetector {
    background: Option<RunningBackground>,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blends `gray` into the background and reports whether it differs enough from it.
    pub fn process_frame(&mut self, gray: &GrayFrame, thresholds: &DetectionThresholds) -> bool {
        if !self.background.as_ref().is_some_and(|bg| bg.matches(gray)) {
            if self.background.is_some() {
                debug!(
                    width = gray.width(),
                    height = gray.height(),
                    "frame size changed; reseeding motion background"
                );
            }
            self.background = Some(RunningBackground::seed(gray));
        }
        let Some(background) = self.background.as_mut() else {
            return false;
        };
        background.accumulate(gray, BACKGROUND_ALPHA);

        let deltas = gray
            .pixels()
            .iter()
            .zip(background.as_u8())
            .map(|(&px, bg)| px.abs_diff(bg));
        binarized_sum(deltas, thresholds.motion_pixel_delta) > thresholds.motion_sum
    }

    pub fn background(&self) -> Option<&RunningBackground> {
        self.background.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::Frame;

    fn gray(frame: &Frame) -> GrayFrame {
        GrayFrame::from_frame(frame).unwrap()
    }

    fn with_square(level: u8) -> Frame {
        let mut frame = Frame::solid(160, 120, 0);
        frame.fill_rect(60, 40, 40, 40, level);
        frame
    }

    #[test]
    fn first_frame_seeds_background_without_motion() {
        let mut detector = MotionDetector::new();
        let thresholds = DetectionThresholds::default();
        assert!(!detector.process_frame(&gray(&with_square(255)), &thresholds));
        assert!(detector.background().is_some());
    }

    #[test]
    fn static_scene_never_reports_motion() {
        let mut detector = MotionDetector::new();
        let thresholds = DetectionThresholds::default();
        let frame = gray(&Frame::solid(160, 120, 80));
        for _ in 0..10 {
            assert!(!detector.process_frame(&frame, &thresholds));
        }
    }

    #[test]
    fn appearing_object_reports_motion_then_settles() {
        let mut detector = MotionDetector::new();
        let thresholds = DetectionThresholds::default();
        let empty = gray(&Frame::solid(160, 120, 0));
        let object = gray(&with_square(255));

        assert!(!detector.process_frame(&empty, &thresholds));
        assert!(detector.process_frame(&object, &thresholds));

        // The background converges geometrically towards the new scene.
        let mut settled = false;
        for _ in 0..8 {
            if !detector.process_frame(&object, &thresholds) {
                settled = true;
                break;
            }
        }
        assert!(settled);
        assert!(!detector.process_frame(&object, &thresholds));
    }

    #[test]
    fn small_change_stays_below_budget() {
        let mut detector = MotionDetector::new();
        let thresholds = DetectionThresholds::default();
        let mut speck = Frame::solid(160, 120, 0);
        speck.fill_rect(80, 60, 2, 2, 255);

        detector.process_frame(&gray(&Frame::solid(160, 120, 0)), &thresholds);
        assert!(!detector.process_frame(&gray(&speck), &thresholds));
    }

    #[test]
    fn size_change_reseeds_instead_of_panicking() {
        let mut detector = MotionDetector::new();
        let thresholds = DetectionThresholds::default();
        detector.process_frame(&gray(&Frame::solid(160, 120, 0)), &thresholds);
        assert!(!detector.process_frame(&gray(&Frame::solid(80, 60, 200)), &thresholds));
    }
}
