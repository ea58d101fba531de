mod actions;
mod camera;
mod config;
mod console;
mod input;

use anyhow::Context;
use config::AppConfig;
use screen_warden::core_modules::media_probe::{
    CommandPowerRequests, NoPowerRequests, PowerRequestSource,
};
use screen_warden::interfaces::PreviewSink;
use screen_warden::preview::PngPreview;
use screen_warden::{Collaborators, ControlCommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The probe the host can actually run.
enum PowerRequests {
    Command(CommandPowerRequests),
    Unavailable(NoPowerRequests),
}

impl PowerRequestSource for PowerRequests {
    async fn query(&self) -> screen_warden::Result<String> {
        match self {
            PowerRequests::Command(source) => source.query().await,
            PowerRequests::Unavailable(source) => source.query().await,
        }
    }
}

fn config_path() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    match (args.next().as_deref(), args.next()) {
        (None, _) => Ok(None),
        (Some("--config"), Some(path)) => Ok(Some(PathBuf::from(path))),
        _ => anyhow::bail!("usage: warden_app [--config <path>]"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = AppConfig::load(config_path()?.as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&app.log_filter)),
        )
        .init();

    let power_requests = match app.power_query_command.split_first() {
        Some((program, args)) => PowerRequests::Command(CommandPowerRequests::new(
            program.clone(),
            args.to_vec(),
            app.probe_timeout(),
        )),
        None => {
            info!("no power-request probe on this platform; video veto disabled");
            PowerRequests::Unavailable(NoPowerRequests)
        }
    };
    let preview = app
        .preview_path
        .clone()
        .map(|path| Box::new(PngPreview::new(path)) as Box<dyn PreviewSink>);

    let synthetic_keys = Arc::new(input::SyntheticKeys::default());
    let (handle, engine) = screen_warden::spawn(
        app.warden.clone(),
        Collaborators {
            cameras: camera::OpenCvCameras::new(app.capture_width, app.capture_height),
            camera_index: app.camera_index,
            power_requests,
            actions: Arc::new(actions::DesktopActions::new(
                app.monitor_off_command.clone(),
                Arc::clone(&synthetic_keys),
            )),
            preview,
        },
    )
    .context("starting the engine")?;

    let filter = input::InputFilter::new(synthetic_keys);
    if let Err(err) = input::spawn_listener(handle.input_latch(), filter) {
        warn!(%err, "input listener could not start");
    }
    info!(camera = app.camera_index, "screen warden running");

    let lines = console::spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
        .context("starting the console reader")?;
    tokio::select! {
        _ = console::run(handle.clone(), lines) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
        }
    }
    handle.send(ControlCommand::Shutdown);
    engine.await.context("engine task")?;
    Ok(())
}
