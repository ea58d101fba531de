use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use screen_warden::core_modules::frame::Frame;
use screen_warden::interfaces::{Camera, CameraProvider};
use screen_warden::{Result, WardenError};
use tracing::debug;

#[cfg(windows)]
const CAPTURE_API: i32 = videoio::CAP_DSHOW;
#[cfg(not(windows))]
const CAPTURE_API: i32 = videoio::CAP_ANY;

fn camera_error(err: opencv::Error) -> WardenError {
    WardenError::camera(err.to_string())
}

/// Opens webcams through OpenCV and asks for a fixed capture size.
pub struct OpenCvCameras {
    width: u32,
    height: u32,
}

impl OpenCvCameras {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl CameraProvider for OpenCvCameras {
    type Device = OpenCvCamera;

    fn open(&mut self, index: i32) -> Result<OpenCvCamera> {
        let mut capture = VideoCapture::new(index, CAPTURE_API).map_err(camera_error)?;
        if !capture.is_opened().map_err(camera_error)? {
            return Err(WardenError::camera(format!("camera {index} did not open")));
        }
        // Drivers may ignore these; the frame carries its real size.
        capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(self.width))
            .map_err(camera_error)?;
        capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(self.height))
            .map_err(camera_error)?;
        Ok(OpenCvCamera {
            capture,
            bgr: Mat::default(),
        })
    }
}

pub struct OpenCvCamera {
    capture: VideoCapture,
    bgr: Mat,
}

impl OpenCvCamera {
    fn grab(&mut self) -> opencv::Result<Option<Frame>> {
        if !self.capture.read(&mut self.bgr)? || self.bgr.empty() {
            return Ok(None);
        }
        // Convert the OpenCV Mat (BGR) to the RGBA layout the engine expects.
        let mut rgba = Mat::default();
        imgproc::cvt_color(&self.bgr, &mut rgba, imgproc::COLOR_BGR2RGBA, 0)?;
        let (width, height) = (rgba.cols() as u32, rgba.rows() as u32);
        Ok(Frame::from_rgba(width, height, rgba.data_bytes()?.to_vec()))
    }
}

impl Camera for OpenCvCamera {
    fn read_frame(&mut self) -> Option<Frame> {
        match self.grab() {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, "frame read failed");
                None
            }
        }
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        if let Err(err) = self.capture.release() {
            debug!(%err, "camera release failed");
        }
    }
}
