use crate::input::{SyntheticKeys, WAKE_KEY};
use rdev::{EventType, Key, simulate};
use screen_warden::interfaces::PowerActions;
use screen_warden::{Result, WardenError};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

// Some platforms drop synthetic events sent back to back.
const KEY_EVENT_GAP: Duration = Duration::from_millis(20);
const BLINK_HOLD: Duration = Duration::from_millis(80);

/// Monitor power through a shell command; wake and blink through synthetic key taps.
pub struct DesktopActions {
    monitor_off_command: Vec<String>,
    synthetic: Arc<SyntheticKeys>,
}

impl DesktopActions {
    pub fn new(monitor_off_command: Vec<String>, synthetic: Arc<SyntheticKeys>) -> Self {
        Self {
            monitor_off_command,
            synthetic,
        }
    }

    fn tap(key: Key) -> Result<()> {
        for event in [EventType::KeyPress(key), EventType::KeyRelease(key)] {
            simulate(&event)
                .map_err(|err| WardenError::action(format!("simulating {event:?}: {err:?}")))?;
            thread::sleep(KEY_EVENT_GAP);
        }
        Ok(())
    }
}

impl PowerActions for DesktopActions {
    fn monitor_off(&self) -> Result<()> {
        let Some((program, args)) = self.monitor_off_command.split_first() else {
            return Err(WardenError::action("no monitor-off command configured"));
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => debug!(%status, "monitor-off command failed"),
            Ok(_) => {}
            Err(err) => debug!(%err, "monitor-off command lost"),
        });
        Ok(())
    }

    fn wake(&self) -> Result<()> {
        self.synthetic.expect();
        self.synthetic.expect();
        let tapped = Self::tap(WAKE_KEY);
        if tapped.is_err() {
            // Whatever was not injected will never be echoed.
            while self.synthetic.absorb() {}
        }
        tapped
    }

    fn scroll_lock_blink(&self) -> Result<()> {
        Self::tap(Key::ScrollLock)?;
        thread::sleep(BLINK_HOLD);
        Self::tap(Key::ScrollLock)
    }
}
