pub mod frame;
pub mod frame_rate;
pub mod fusion;
pub mod input_latch;
pub mod media_probe;
pub mod motion_detector;
pub mod power;
pub mod presence_detector;
