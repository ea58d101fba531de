// THEORY:
// Presence detection is a crude heuristic: keep one snapshot of the
// empty room and call the room "occupied" whenever the current frame differs from
// it by enough pixels. There is no temporal state and no re-identification; the
// result is a pure function of (frame, reference, enabled).
//
// The reference lives in a `ReferenceSlot`. Replacing it swaps a whole `Arc`, so a
// reader either sees the previous snapshot or the new one, never a mix.

use crate::config::DetectionThresholds;
use crate::core_modules::frame::{GrayFrame, binarized_sum};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// How long a reference capture waits before taking its shot.
pub const REFERENCE_CAPTURE_DELAY: Duration = Duration::from_secs(5);

/// An immutable blurred grayscale snapshot of the empty room.
pub type ReferenceFrame = Arc<GrayFrame>;

/// Holder for the optional reference snapshot.
#[derive(Debug, Default)]
pub struct ReferenceSlot {
    current: RwLock<Option<ReferenceFrame>>,
}

impl ReferenceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new reference, replacing any previous one.
    pub fn install(&self, reference: GrayFrame) {
        let reference = Arc::new(reference);
        match self.current.write() {
            Ok(mut slot) => *slot = Some(reference),
            Err(poisoned) => *poisoned.into_inner() = Some(reference),
        }
    }

    pub fn get(&self) -> Option<ReferenceFrame> {
        match self.current.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

/// Reports whether `gray` differs from the empty-room `reference` enough to count as presence.
pub fn detect_presence(
    gray: &GrayFrame,
    reference: Option<&GrayFrame>,
    enabled: bool,
    thresholds: &DetectionThresholds,
) -> bool {
    let Some(reference) = reference else {
        return false;
    };
    if !enabled {
        return false;
    }
    if !reference.same_dimensions(gray) {
        debug!(
            frame_width = gray.width(),
            frame_height = gray.height(),
            reference_width = reference.width(),
            reference_height = reference.height(),
            "reference snapshot does not match frame size; presence disabled until recaptured"
        );
        return false;
    }

    let deltas = gray
        .pixels()
        .iter()
        .zip(reference.pixels())
        .map(|(&a, &b)| a.abs_diff(b));
    let sum = binarized_sum(deltas, thresholds.presence_pixel_delta);
    debug!(sum, "presence difference");
    sum > thresholds.presence_sum
}
