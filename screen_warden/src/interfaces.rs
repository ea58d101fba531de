// The seams between the engine and the machine it runs on. Each collaborator is a
// thin I/O wrapper; the engine only needs these contracts.

use crate::core_modules::frame::Frame;
use crate::error::Result;

/// An open capture device. Dropping it releases the device.
pub trait Camera: Send {
    /// Reads the next frame. `None` means "no frame this cycle", never fatal.
    fn read_frame(&mut self) -> Option<Frame>;
}

/// Opens capture devices by index.
pub trait CameraProvider: Send {
    type Device: Camera;

    fn open(&mut self, index: i32) -> Result<Self::Device>;
}

/// OS-level power and input primitives.
pub trait PowerActions: Send + Sync {
    fn monitor_off(&self) -> Result<()>;

    /// Taps a benign key so the OS turns the display back on.
    fn wake(&self) -> Result<()>;

    /// Cosmetic motion feedback.
    fn scroll_lock_blink(&self) -> Result<()>;
}

/// Receives every processed frame for display.
pub trait PreviewSink: Send {
    fn present(&mut self, frame: &Frame, motion: bool);
}
