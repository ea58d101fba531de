use rdev::{EventType, Key, listen};
use screen_warden::core_modules::input_latch::InputLatch;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use tracing::{debug, error};

/// The key tapped to wake the display.
pub const WAKE_KEY: Key = Key::ShiftLeft;

/// Key events we injected ourselves and expect to see echoed by the hook.
#[derive(Debug, Default)]
pub struct SyntheticKeys {
    pending: AtomicU32,
}

impl SyntheticKeys {
    pub fn expect(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Consumes one expected event. Returns false when none was pending.
    pub fn absorb(&self) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Whether an OS input event counts as a human touching the machine.
pub fn is_human_input(event: &EventType) -> bool {
    match event {
        // The scroll-lock blink is our own feedback.
        EventType::KeyPress(Key::ScrollLock) | EventType::KeyRelease(Key::ScrollLock) => false,
        EventType::KeyPress(_)
        | EventType::KeyRelease(_)
        | EventType::ButtonPress(_)
        | EventType::ButtonRelease(_)
        | EventType::MouseMove { .. }
        | EventType::Wheel { .. } => true,
    }
}

/// Decides which hook events reach the latch.
pub struct InputFilter {
    synthetic: Arc<SyntheticKeys>,
}

impl InputFilter {
    pub fn new(synthetic: Arc<SyntheticKeys>) -> Self {
        Self { synthetic }
    }

    pub fn accepts(&self, event: &EventType) -> bool {
        if !is_human_input(event) {
            return false;
        }
        let injected_key = matches!(
            event,
            EventType::KeyPress(key) | EventType::KeyRelease(key) if *key == WAKE_KEY
        );
        !(injected_key && self.synthetic.absorb())
    }
}

/// Starts the global keyboard and mouse hook on its own thread.
pub fn spawn_listener(latch: Arc<InputLatch>, filter: InputFilter) -> std::io::Result<()> {
    thread::Builder::new()
        .name("warden-input".into())
        .spawn(move || {
            debug!("input listener started");
            if let Err(err) = listen(move |event| {
                if filter.accepts(&event.event_type) {
                    latch.signal();
                }
            }) {
                error!(?err, "input listener stopped; human input will not be seen");
            }
        })?;
    Ok(())
}
