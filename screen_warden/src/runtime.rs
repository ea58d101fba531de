// THEORY:
// The runtime wires the pure stages to the three asynchronous producers.
//
// 1.  **Capture worker** (dedicated thread): owns the camera and the detection
//     pipeline. It waits on its command channel with a timeout equal to the current
//     capture interval, so the frame-rate optimizer reschedules captures simply by
//     changing that timeout. Verdicts are published through `FrameSignals`.
// 2.  **Input listener** (collaborator thread): only ever calls `InputLatch::signal`.
// 3.  **Tick loop** (tokio task): the sole owner of `CoreState`. Once a second it
//     polls the media probe, snapshots the frame signals, runs fusion and executes
//     the resulting power action. Control commands are handled on the same task, so
//     no lock guards the core state.
//
// Configuration lives in a `watch` channel shared by everyone; each frame and each
// tick reads a fresh copy.

use crate::config::WardenConfig;
use crate::core_modules::frame::GrayFrame;
use crate::core_modules::frame_rate::{CaptureScheduler, UNOPTIMIZED_INTERVAL};
use crate::core_modules::fusion::{self, CoreState, TickReport};
use crate::core_modules::input_latch::InputLatch;
use crate::core_modules::media_probe::{MediaActivityProbe, PowerRequestSource};
use crate::core_modules::power::PowerAction;
use crate::core_modules::presence_detector::{REFERENCE_CAPTURE_DELAY, ReferenceSlot};
use crate::error::Result;
use crate::interfaces::{Camera, CameraProvider, PowerActions, PreviewSink};
use crate::pipeline::DetectionPipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc as std_mpsc};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// How long frame verdicts outlive the last usable frame before they fall back to inactive.
pub const STALE_SIGNALS_AFTER: Duration = TICK_INTERVAL;

/// Latest frame verdicts, written by the capture worker and read by the tick.
#[derive(Debug, Default)]
pub struct FrameSignals {
    motion: AtomicBool,
    presence: AtomicBool,
}

impl FrameSignals {
    pub fn store(&self, motion: bool, presence: bool) {
        self.motion.store(motion, Ordering::Release);
        self.presence.store(presence, Ordering::Release);
    }

    pub fn clear(&self) {
        self.store(false, false);
    }

    pub fn snapshot(&self) -> (bool, bool) {
        (
            self.motion.load(Ordering::Acquire),
            self.presence.load(Ordering::Acquire),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Start,
    Stop,
    SnapshotReference,
    Shutdown,
}

/// Runs scroll-lock blinks on their own thread so the frame path never waits on
/// them. At most one blink is queued; further requests are dropped until it runs.
pub struct FeedbackBlinker {
    requests: Option<std_mpsc::SyncSender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FeedbackBlinker {
    pub fn new(actions: Arc<dyn PowerActions>) -> Self {
        let (requests, pending) = std_mpsc::sync_channel::<()>(1);
        let spawned = thread::Builder::new()
            .name("warden-blink".into())
            .spawn(move || {
                while pending.recv().is_ok() {
                    if let Err(err) = actions.scroll_lock_blink() {
                        debug!(%err, "scroll lock blink failed");
                    }
                }
            });
        match spawned {
            Ok(thread) => Self {
                requests: Some(requests),
                thread: Some(thread),
            },
            Err(err) => {
                warn!(%err, "blink thread could not start; motion feedback disabled");
                Self {
                    requests: None,
                    thread: None,
                }
            }
        }
    }

    /// Queues a blink without waiting. Returns whether it was accepted.
    pub fn request(&self) -> bool {
        self.requests
            .as_ref()
            .is_some_and(|requests| requests.try_send(()).is_ok())
    }
}

impl Drop for FeedbackBlinker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The capture worker's scheduler: the interval is the wait between frames.
#[derive(Debug, Clone, Copy)]
pub struct CaptureClock {
    interval: Duration,
}

impl CaptureScheduler for CaptureClock {
    fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}

pub struct CaptureWorker<P: CameraProvider> {
    provider: P,
    camera_index: i32,
    camera: Option<P::Device>,
    pipeline: DetectionPipeline,
    clock: CaptureClock,
    config: Arc<watch::Sender<WardenConfig>>,
    signals: Arc<FrameSignals>,
    blinker: FeedbackBlinker,
    preview: Option<Box<dyn PreviewSink>>,
    missed_frames: u32,
}

impl<P: CameraProvider> CaptureWorker<P> {
    pub fn new(
        provider: P,
        camera_index: i32,
        reference: Arc<ReferenceSlot>,
        config: Arc<watch::Sender<WardenConfig>>,
        signals: Arc<FrameSignals>,
        actions: Arc<dyn PowerActions>,
        preview: Option<Box<dyn PreviewSink>>,
    ) -> Self {
        Self {
            provider,
            camera_index,
            camera: None,
            pipeline: DetectionPipeline::new(reference),
            clock: CaptureClock {
                interval: UNOPTIMIZED_INTERVAL,
            },
            config,
            signals,
            blinker: FeedbackBlinker::new(actions),
            preview,
            missed_frames: 0,
        }
    }

    pub fn run(mut self, commands: std_mpsc::Receiver<CaptureCommand>) {
        loop {
            let next = if self.camera.is_some() {
                commands.recv_timeout(self.clock.interval)
            } else {
                commands
                    .recv()
                    .map_err(|_| std_mpsc::RecvTimeoutError::Disconnected)
            };
            match next {
                Ok(CaptureCommand::Shutdown) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                    break;
                }
                Ok(command) => self.handle(command),
                Err(std_mpsc::RecvTimeoutError::Timeout) => self.capture_once(),
            }
        }
        self.stop_camera();
        debug!("capture worker stopped");
    }

    pub fn handle(&mut self, command: CaptureCommand) {
        match command {
            CaptureCommand::Start => self.start_camera(),
            CaptureCommand::Stop => self.stop_camera(),
            CaptureCommand::SnapshotReference => {
                self.snapshot_reference();
            }
            CaptureCommand::Shutdown => self.stop_camera(),
        }
    }

    pub fn camera_running(&self) -> bool {
        self.camera.is_some()
    }

    pub fn capture_interval(&self) -> Duration {
        self.clock.interval
    }

    fn start_camera(&mut self) {
        if self.camera.is_some() {
            return;
        }
        match self.provider.open(self.camera_index) {
            Ok(device) => {
                info!(index = self.camera_index, "camera started");
                self.camera = Some(device);
            }
            Err(err) => warn!(%err, index = self.camera_index, "camera could not be opened"),
        }
    }

    fn stop_camera(&mut self) {
        if self.camera.take().is_some() {
            info!(index = self.camera_index, "camera released");
        }
        self.missed_frames = 0;
        self.signals.clear();
    }

    /// Processes one frame if one is available.
    pub fn capture_once(&mut self) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        let frame = camera.read_frame();
        let config = self.config.borrow().clone();
        let processed = frame.and_then(|frame| {
            let report = self.pipeline.process_frame(&frame, &config, &mut self.clock)?;
            Some((frame, report))
        });
        let Some((frame, report)) = processed else {
            self.frame_missed();
            return;
        };

        self.missed_frames = 0;
        self.signals.store(report.motion, report.presence);
        if let Some(interval) = report.rescheduled {
            debug!(interval_ms = interval.as_millis() as u64, "capture rescheduled");
        }

        if report.motion && config.scroll_lock_feedback {
            self.blinker.request();
        }
        if let Some(preview) = self.preview.as_mut() {
            preview.present(&frame, report.motion);
        }
    }

    /// Keeps the last verdicts through short gaps; after `STALE_SIGNALS_AFTER`
    /// without a usable frame they drop to inactive.
    fn frame_missed(&mut self) {
        self.missed_frames = self.missed_frames.saturating_add(1);
        let stale_for = self.clock.interval.saturating_mul(self.missed_frames);
        if stale_for < STALE_SIGNALS_AFTER {
            debug!("no frame this cycle");
            return;
        }
        if self.signals.snapshot() != (false, false) {
            warn!(
                missed = self.missed_frames,
                "camera is not delivering frames; motion and presence cleared"
            );
            self.signals.clear();
        }
    }

    /// Takes one frame as the new empty-room reference. Returns whether it succeeded.
    pub fn snapshot_reference(&mut self) -> bool {
        let frame = self.camera.as_mut().and_then(|camera| camera.read_frame());
        let snapshot = frame.and_then(|frame| {
            let gray = GrayFrame::from_frame(&frame)?;
            Some((frame, gray))
        });
        let Some((frame, gray)) = snapshot else {
            info!("no frame available; reference snapshot skipped");
            return false;
        };
        self.pipeline.reference().install(gray);
        self.config
            .send_modify(|config| config.reference_mode_enabled = true);
        info!(
            width = frame.width,
            height = frame.height,
            "empty-room reference captured"
        );
        true
    }
}

/// Waits out the reference-capture delay, then asks the worker for the shot.
pub async fn request_reference_capture(
    capture: std_mpsc::Sender<CaptureCommand>,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;
    if capture.send(CaptureCommand::SnapshotReference).is_err() {
        debug!("capture worker gone; reference snapshot dropped");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    CaptureReference,
    SetEnabled(bool),
    ToggleEnabled,
    StartCamera,
    StopCamera,
    Shutdown,
}

/// A snapshot of the engine for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WardenStatus {
    pub enabled: bool,
    pub motion: bool,
    pub presence: bool,
    pub video: bool,
    pub input: bool,
    pub idle_seconds: u64,
    pub monitor_off: bool,
    pub reference_set: bool,
}

impl std::fmt::Display for WardenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        if !self.enabled {
            return write!(f, "stopped");
        }
        write!(
            f,
            "motion: {} | input: {} | presence: {} | video: {} | idle: {} s | monitor: {} | reference: {}",
            yes_no(self.motion),
            yes_no(self.input),
            yes_no(self.presence),
            yes_no(self.video),
            self.idle_seconds,
            if self.monitor_off { "off" } else { "on" },
            if self.reference_set { "set" } else { "none" },
        )
    }
}

pub struct TickLoop<S> {
    state: CoreState,
    config: Arc<watch::Sender<WardenConfig>>,
    latch: Arc<InputLatch>,
    signals: Arc<FrameSignals>,
    reference: Arc<ReferenceSlot>,
    probe: MediaActivityProbe<S>,
    actions: Arc<dyn PowerActions>,
    capture: std_mpsc::Sender<CaptureCommand>,
    status: watch::Sender<WardenStatus>,
}

impl<S: PowerRequestSource> TickLoop<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<watch::Sender<WardenConfig>>,
        latch: Arc<InputLatch>,
        signals: Arc<FrameSignals>,
        reference: Arc<ReferenceSlot>,
        probe: MediaActivityProbe<S>,
        actions: Arc<dyn PowerActions>,
        capture: std_mpsc::Sender<CaptureCommand>,
        status: watch::Sender<WardenStatus>,
    ) -> Self {
        Self {
            state: CoreState::new(),
            config,
            latch,
            signals,
            reference,
            probe,
            actions,
            capture,
            status,
        }
    }

    pub fn state(&self) -> &CoreState {
        &self.state
    }

    pub async fn run(mut self, mut control: mpsc::UnboundedReceiver<ControlCommand>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = tokio::time::Instant::now().into_std();
                    self.on_tick(now).await;
                }
                command = control.recv() => match command {
                    Some(ControlCommand::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
            }
        }
        let _ = self.capture.send(CaptureCommand::Shutdown);
        info!("warden stopped");
    }

    pub async fn on_tick(&mut self, now: Instant) -> TickReport {
        if !self.state.enabled {
            self.publish_status();
            return fusion::tick(&mut self.state, &self.config.borrow(), &self.latch, now);
        }

        let video_active = self.probe.poll().await;
        let (motion, presence) = self.signals.snapshot();
        self.state.detection.motion_detected = motion;
        self.state.detection.presence_detected = presence;
        self.state.detection.video_active = video_active;

        let config = self.config.borrow().clone();
        let report = fusion::tick(&mut self.state, &config, &self.latch, now);
        self.execute(report.action).await;
        self.publish_status();
        report
    }

    /// Runs the OS side of a transition on the blocking pool.
    async fn execute(&self, action: PowerAction) {
        if action == PowerAction::None {
            return;
        }
        let actions = Arc::clone(&self.actions);
        let outcome = tokio::task::spawn_blocking(move || match action {
            PowerAction::MonitorOff => actions.monitor_off(),
            PowerAction::Wake => actions.wake(),
            PowerAction::None => Ok(()),
        })
        .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%err, ?action, "power action failed"),
            Err(err) => warn!(%err, ?action, "power action did not complete"),
        }
    }

    pub fn on_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::CaptureReference => {
                info!(
                    delay_secs = REFERENCE_CAPTURE_DELAY.as_secs(),
                    "reference snapshot scheduled; leave the frame"
                );
                tokio::spawn(request_reference_capture(
                    self.capture.clone(),
                    REFERENCE_CAPTURE_DELAY,
                ));
            }
            ControlCommand::SetEnabled(enabled) => self.set_enabled(enabled),
            ControlCommand::ToggleEnabled => self.set_enabled(!self.state.enabled),
            ControlCommand::StartCamera => self.send_capture(CaptureCommand::Start),
            ControlCommand::StopCamera => self.send_capture(CaptureCommand::Stop),
            ControlCommand::Shutdown => self.send_capture(CaptureCommand::Shutdown),
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.state.set_enabled(enabled);
        self.latch.set_armed(enabled);
        self.signals.clear();
        self.send_capture(if enabled {
            CaptureCommand::Start
        } else {
            CaptureCommand::Stop
        });
        info!(enabled, "master switch");
        self.publish_status();
    }

    fn send_capture(&self, command: CaptureCommand) {
        if self.capture.send(command).is_err() {
            warn!(?command, "capture worker is not running");
        }
    }

    fn publish_status(&self) {
        let detection = self.state.detection;
        let status = WardenStatus {
            enabled: self.state.enabled,
            motion: detection.motion_detected,
            presence: detection.presence_detected,
            video: detection.video_active,
            input: self.latch.observe().active,
            idle_seconds: self.state.timing.idle_seconds,
            monitor_off: self.state.timing.monitor_off(),
            reference_set: self.reference.is_set(),
        };
        self.status.send_replace(status);
    }
}

/// The caller's side of a running engine.
#[derive(Clone)]
pub struct WardenHandle {
    control: mpsc::UnboundedSender<ControlCommand>,
    config: Arc<watch::Sender<WardenConfig>>,
    status: watch::Receiver<WardenStatus>,
    latch: Arc<InputLatch>,
}

impl WardenHandle {
    pub fn send(&self, command: ControlCommand) -> bool {
        self.control.send(command).is_ok()
    }

    pub fn config(&self) -> WardenConfig {
        self.config.borrow().clone()
    }

    /// Applies `change` to the live configuration.
    pub fn update_config(&self, change: impl FnOnce(&mut WardenConfig) -> Result<()>) -> Result<()> {
        let mut next = self.config();
        change(&mut next)?;
        next.validate()?;
        self.config.send_replace(next);
        Ok(())
    }

    pub fn status(&self) -> WardenStatus {
        *self.status.borrow()
    }

    /// The latch the input listener should signal.
    pub fn input_latch(&self) -> Arc<InputLatch> {
        Arc::clone(&self.latch)
    }
}

/// Everything the engine needs from the host.
pub struct Collaborators<P, S> {
    pub cameras: P,
    pub camera_index: i32,
    pub power_requests: S,
    pub actions: Arc<dyn PowerActions>,
    pub preview: Option<Box<dyn PreviewSink>>,
}

/// Starts the capture worker thread and the tick task. Must be called inside a tokio runtime.
pub fn spawn<P, S>(
    config: WardenConfig,
    collaborators: Collaborators<P, S>,
) -> Result<(WardenHandle, JoinHandle<()>)>
where
    P: CameraProvider + 'static,
    S: PowerRequestSource + 'static,
{
    config.validate()?;
    let config = Arc::new(watch::Sender::new(config));
    let latch = Arc::new(InputLatch::new());
    let signals = Arc::new(FrameSignals::default());
    let reference = Arc::new(ReferenceSlot::new());
    let (capture_tx, capture_rx) = std_mpsc::channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(WardenStatus::default());

    let worker = CaptureWorker::new(
        collaborators.cameras,
        collaborators.camera_index,
        Arc::clone(&reference),
        Arc::clone(&config),
        Arc::clone(&signals),
        Arc::clone(&collaborators.actions),
        collaborators.preview,
    );
    std::thread::Builder::new()
        .name("warden-capture".into())
        .spawn(move || worker.run(capture_rx))?;

    let tick_loop = TickLoop::new(
        Arc::clone(&config),
        Arc::clone(&latch),
        signals,
        reference,
        MediaActivityProbe::new(collaborators.power_requests),
        collaborators.actions,
        capture_tx.clone(),
        status_tx,
    );
    let _ = capture_tx.send(CaptureCommand::Start);
    let task = tokio::spawn(tick_loop.run(control_rx));

    let handle = WardenHandle {
        control: control_tx,
        config,
        status: status_rx,
        latch,
    };
    Ok((handle, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::frame::Frame;
    use crate::core_modules::media_probe::NoPowerRequests;
    use crate::error::WardenError;
    use crate::interfaces::Camera;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingActions {
        calls: Mutex<Vec<&'static str>>,
        threads: Mutex<Vec<thread::ThreadId>>,
    }

    impl RecordingActions {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PowerActions for RecordingActions {
        fn monitor_off(&self) -> Result<()> {
            self.calls.lock().unwrap().push("off");
            self.threads.lock().unwrap().push(thread::current().id());
            Ok(())
        }
        fn wake(&self) -> Result<()> {
            self.calls.lock().unwrap().push("wake");
            self.threads.lock().unwrap().push(thread::current().id());
            Ok(())
        }
        fn scroll_lock_blink(&self) -> Result<()> {
            self.calls.lock().unwrap().push("blink");
            Err(WardenError::action("no keyboard"))
        }
    }

    struct ScriptedCamera {
        frames: VecDeque<Frame>,
    }

    impl Camera for ScriptedCamera {
        fn read_frame(&mut self) -> Option<Frame> {
            self.frames.pop_front()
        }
    }

    struct ScriptedCameras {
        frames: Vec<Frame>,
        available: bool,
    }

    impl CameraProvider for ScriptedCameras {
        type Device = ScriptedCamera;

        fn open(&mut self, _index: i32) -> Result<ScriptedCamera> {
            if !self.available {
                return Err(WardenError::camera("no device"));
            }
            Ok(ScriptedCamera {
                frames: self.frames.iter().cloned().collect(),
            })
        }
    }

    fn worker(
        frames: Vec<Frame>,
        available: bool,
        actions: Arc<RecordingActions>,
    ) -> (CaptureWorker<ScriptedCameras>, Arc<watch::Sender<WardenConfig>>, Arc<FrameSignals>) {
        let config = Arc::new(watch::Sender::new(WardenConfig::default()));
        let signals = Arc::new(FrameSignals::default());
        let worker = CaptureWorker::new(
            ScriptedCameras { frames, available },
            0,
            Arc::new(ReferenceSlot::new()),
            Arc::clone(&config),
            Arc::clone(&signals),
            actions,
            None,
        );
        (worker, config, signals)
    }

    fn empty_room() -> Frame {
        Frame::solid(160, 120, 30)
    }

    fn busy_room() -> Frame {
        let mut frame = empty_room();
        frame.fill_rect(50, 30, 50, 60, 230);
        frame
    }

    #[test]
    fn reference_capture_without_camera_changes_nothing() {
        let (mut worker, config, _) = worker(Vec::new(), false, Arc::default());
        worker.handle(CaptureCommand::Start);
        assert!(!worker.camera_running());

        assert!(!worker.snapshot_reference());
        assert!(!worker.pipeline.reference().is_set());
        assert!(!config.borrow().reference_mode_enabled);
    }

    #[test]
    fn reference_capture_installs_and_enables_reference_mode() {
        let (mut worker, config, _) = worker(vec![empty_room()], true, Arc::default());
        worker.handle(CaptureCommand::Start);
        assert!(worker.snapshot_reference());
        assert!(worker.pipeline.reference().is_set());
        assert!(config.borrow().reference_mode_enabled);
    }

    #[test]
    fn frames_publish_signals_and_blink_on_motion() {
        let actions = Arc::new(RecordingActions::default());
        let (mut worker, _, signals) = worker(
            vec![empty_room(), busy_room()],
            true,
            Arc::clone(&actions),
        );
        worker.handle(CaptureCommand::Start);

        worker.capture_once();
        assert_eq!(signals.snapshot(), (false, false));
        worker.capture_once();
        assert_eq!(signals.snapshot(), (true, false));
        assert_eq!(worker.capture_interval(), Duration::from_millis(333));

        // Script exhausted: a single missing frame keeps the previous verdicts.
        worker.capture_once();
        assert_eq!(signals.snapshot(), (true, false));

        // Dropping the worker drains the blink thread.
        drop(worker);
        assert_eq!(actions.calls(), vec!["blink"]);
    }

    #[test]
    fn malformed_frames_are_skipped_not_fatal() {
        let empty = Frame {
            width: 0,
            height: 0,
            data: Vec::new(),
        };
        let (mut worker, config, signals) =
            worker(vec![empty.clone(), empty], true, Arc::default());
        worker.handle(CaptureCommand::Start);

        worker.capture_once();
        assert_eq!(signals.snapshot(), (false, false));
        assert!(!worker.snapshot_reference());
        assert!(!config.borrow().reference_mode_enabled);
    }

    struct GatedBlink {
        gate: Mutex<std_mpsc::Receiver<()>>,
        blinks: AtomicUsize,
    }

    impl PowerActions for GatedBlink {
        fn monitor_off(&self) -> Result<()> {
            Ok(())
        }
        fn wake(&self) -> Result<()> {
            Ok(())
        }
        fn scroll_lock_blink(&self) -> Result<()> {
            let _ = self.gate.lock().unwrap().recv();
            self.blinks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn blink_requests_never_wait_for_the_blink() {
        let (open, gate) = std_mpsc::channel();
        let actions = Arc::new(GatedBlink {
            gate: Mutex::new(gate),
            blinks: AtomicUsize::new(0),
        });
        let blinker = FeedbackBlinker::new(actions.clone());

        // The blink itself is stuck on the gate; requests must still return at once.
        let accepted = (0..20).filter(|_| blinker.request()).count();
        assert!((1..=2).contains(&accepted));

        drop(open);
        drop(blinker);
        assert_eq!(actions.blinks.load(Ordering::SeqCst), accepted);
    }

    #[test]
    fn stopping_releases_camera_and_clears_signals() {
        let (mut worker, _, signals) = worker(vec![empty_room()], true, Arc::default());
        worker.handle(CaptureCommand::Start);
        signals.store(true, true);
        worker.handle(CaptureCommand::Stop);
        assert!(!worker.camera_running());
        assert_eq!(signals.snapshot(), (false, false));
    }

    #[tokio::test(start_paused = true)]
    async fn reference_request_waits_for_the_delay() {
        let (tx, rx) = std_mpsc::channel();
        let request = tokio::spawn(request_reference_capture(tx, REFERENCE_CAPTURE_DELAY));

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        request.await.unwrap();
        assert_eq!(rx.try_recv(), Ok(CaptureCommand::SnapshotReference));
    }

    fn tick_loop(
        actions: Arc<RecordingActions>,
        signals: Arc<FrameSignals>,
    ) -> (
        TickLoop<NoPowerRequests>,
        Arc<InputLatch>,
        Arc<FrameSignals>,
        std_mpsc::Receiver<CaptureCommand>,
    ) {
        let config = Arc::new(watch::Sender::new(WardenConfig::default()));
        let latch = Arc::new(InputLatch::new());
        let (capture_tx, capture_rx) = std_mpsc::channel();
        let (status_tx, _) = watch::channel(WardenStatus::default());
        let tick_loop = TickLoop::new(
            config,
            Arc::clone(&latch),
            Arc::clone(&signals),
            Arc::new(ReferenceSlot::new()),
            MediaActivityProbe::new(NoPowerRequests),
            actions,
            capture_tx,
            status_tx,
        );
        (tick_loop, latch, signals, capture_rx)
    }

    #[tokio::test]
    async fn idle_timeout_turns_monitor_off_and_motion_wakes_it() {
        let actions = Arc::new(RecordingActions::default());
        let (mut ticks, _, signals, _) = tick_loop(Arc::clone(&actions), Arc::default());
        let t0 = Instant::now();

        for n in 1..=10 {
            ticks.on_tick(t0 + Duration::from_secs(n)).await;
        }
        assert!(ticks.state().timing.monitor_off());
        assert_eq!(actions.calls(), vec!["off"]);

        signals.store(true, false);
        let report = ticks.on_tick(t0 + Duration::from_secs(11)).await;
        assert_eq!(report.action, PowerAction::Wake);
        assert_eq!(actions.calls(), vec!["off", "wake"]);
    }

    #[tokio::test]
    async fn power_actions_run_off_the_tick_thread() {
        let actions = Arc::new(RecordingActions::default());
        let (mut ticks, latch, _, _) = tick_loop(Arc::clone(&actions), Arc::default());
        let t0 = Instant::now();

        for n in 1..=10 {
            ticks.on_tick(t0 + Duration::from_secs(n)).await;
        }
        latch.signal();
        ticks.on_tick(t0 + Duration::from_secs(11)).await;

        assert_eq!(actions.calls(), vec!["off", "wake"]);
        let tick_thread = thread::current().id();
        let threads = actions.threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|id| *id != tick_thread));
    }

    #[tokio::test]
    async fn dead_camera_lets_the_room_go_idle() {
        let (mut worker, _, signals) =
            worker(vec![empty_room(), busy_room()], true, Arc::default());
        let (mut ticks, _, _, _) = tick_loop(Arc::default(), Arc::clone(&signals));
        let t0 = Instant::now();

        worker.handle(CaptureCommand::Start);
        worker.capture_once();
        worker.capture_once();
        assert_eq!(signals.snapshot(), (true, false));
        assert!(ticks.on_tick(t0 + Duration::from_secs(1)).await.system_active);

        // At 333 ms per capture, three misses are still under a second.
        for _ in 0..3 {
            worker.capture_once();
        }
        assert_eq!(signals.snapshot(), (true, false));
        worker.capture_once();
        assert_eq!(signals.snapshot(), (false, false));

        for n in 1..=3 {
            let report = ticks.on_tick(t0 + Duration::from_secs(1 + n)).await;
            assert!(!report.system_active);
            assert_eq!(report.idle_seconds, n);
        }
    }

    #[tokio::test]
    async fn master_switch_stops_camera_and_suspends_ticks() {
        let actions = Arc::new(RecordingActions::default());
        let (mut ticks, latch, _, capture_rx) = tick_loop(Arc::clone(&actions), Arc::default());
        let t0 = Instant::now();

        ticks.on_tick(t0).await;
        ticks.on_command(ControlCommand::ToggleEnabled);
        assert!(!ticks.state().enabled);
        assert_eq!(capture_rx.try_recv(), Ok(CaptureCommand::Stop));
        assert!(!latch.is_armed());

        for n in 1..=30 {
            ticks.on_tick(t0 + Duration::from_secs(n)).await;
        }
        assert_eq!(ticks.state().timing.idle_seconds, 0);
        assert!(actions.calls().is_empty());

        ticks.on_command(ControlCommand::SetEnabled(true));
        assert_eq!(capture_rx.try_recv(), Ok(CaptureCommand::Start));
        assert!(latch.is_armed());
    }

    #[test]
    fn status_line_reads_naturally() {
        let status = WardenStatus {
            enabled: true,
            motion: true,
            idle_seconds: 4,
            ..WardenStatus::default()
        };
        assert_eq!(
            status.to_string(),
            "motion: yes | input: no | presence: no | video: no | idle: 4 s | monitor: on | reference: none"
        );
        assert_eq!(WardenStatus::default().to_string(), "stopped");
    }
}
