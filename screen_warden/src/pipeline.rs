// THEORY:
// The `pipeline` module is the per-frame half of the engine. It hides the detector
// stack behind one call: hand it a frame and the live configuration, get back a
// `FrameReport` with both verdicts and, when the feedback loop decided so, a new
// capture interval.
//
// Stages:
// 1.  Reduce the frame to its blurred gray form (shared by both detectors).
// 2.  Motion: blend into the running background and difference against it.
// 3.  Presence: difference against the empty-room reference, if one exists and
//     reference mode is on.
// 4.  Optimizer: let the presence verdict pick the next capture interval.

use crate::config::WardenConfig;
use crate::core_modules::frame::{Frame, GrayFrame};
use crate::core_modules::frame_rate::{CaptureScheduler, FrameRateOptimizer};
use crate::core_modules::motion_detector::MotionDetector;
use crate::core_modules::presence_detector::{ReferenceSlot, detect_presence};
use std::sync::Arc;
use std::time::Duration;

/// The verdicts for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub motion: bool,
    pub presence: bool,
    /// Set when the capture interval was changed because of this frame.
    pub rescheduled: Option<Duration>,
}

pub struct DetectionPipeline {
    motion_detector: MotionDetector,
    reference: Arc<ReferenceSlot>,
    optimizer: FrameRateOptimizer,
}

impl DetectionPipeline {
    pub fn new(reference: Arc<ReferenceSlot>) -> Self {
        Self {
            motion_detector: MotionDetector::new(),
            reference,
            optimizer: FrameRateOptimizer::new(),
        }
    }

    /// Runs every stage on one frame. Returns `None`, leaving all state untouched,
    /// when the frame is empty or malformed.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        config: &WardenConfig,
        scheduler: &mut impl CaptureScheduler,
    ) -> Option<FrameReport> {
        let gray = GrayFrame::from_frame(frame)?;
        let motion = self.motion_detector.process_frame(&gray, &config.detection);

        let reference = self.reference.get();
        let presence = detect_presence(
            &gray,
            reference.as_deref(),
            config.reference_mode_enabled,
            &config.detection,
        );

        let rescheduled = self.optimizer.retune(config, presence, scheduler);
        Some(FrameReport {
            motion,
            presence,
            rescheduled,
        })
    }

    pub fn capture_interval(&self) -> Duration {
        self.optimizer.current()
    }

    pub fn reference(&self) -> &Arc<ReferenceSlot> {
        &self.reference
    }
}
