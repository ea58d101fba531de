use std::process::ExitStatus;
use std::time::Duration;

pub type Result<T, E = WardenError> = core::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum WardenError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("camera: {0}")]
    Camera(String),
    /// The power-request query did not finish within its budget.
    #[error("power request query timed out after {0:?}")]
    ProbeTimeout(Duration),
    #[error("power request query exited with {0}")]
    ProbeExit(ExitStatus),
    #[error("os action failed: {0}")]
    Action(String),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

impl WardenError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
    pub fn camera(msg: impl Into<String>) -> Self {
        Self::Camera(msg.into())
    }
    pub fn action(msg: impl Into<String>) -> Self {
        Self::Action(msg.into())
    }
}
