// THEORY:
// This file is the entry point for the `screen_warden` library crate. It exposes the
// activity-inference engine: detectors that look at camera frames, a media probe that
// asks the OS whether video is playing, an input latch fed by the host's keyboard and
// mouse hook, and the once-per-second fusion step that decides when the display goes
// dark and when it comes back.
//
// The pure logic lives in `core_modules`. `pipeline` bundles the per-frame stages,
// `runtime` wires them to threads and channels, and `interfaces` names the few things
// a host must supply (a camera, OS power actions, an optional preview sink). Nothing
// in here talks to a real device, so the whole engine runs under test.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod interfaces;
pub mod pipeline;
pub mod preview;
pub mod runtime;

pub use config::{DetectionThresholds, WardenConfig};
pub use error::{Result, WardenError};
pub use runtime::{Collaborators, ControlCommand, WardenHandle, WardenStatus, spawn};
