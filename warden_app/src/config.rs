use anyhow::{Context, bail};
use screen_warden::WardenConfig;
use screen_warden::runtime::TICK_INTERVAL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Host settings around the engine's own `[warden]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera_index: i32,
    pub capture_width: u32,
    pub capture_height: u32,
    pub preview_path: Option<PathBuf>,
    /// Program and arguments that put the display to sleep.
    pub monitor_off_command: Vec<String>,
    /// Program and arguments that print the OS power requests. Empty disables the probe.
    pub power_query_command: Vec<String>,
    pub probe_timeout_ms: u64,
    pub log_filter: String,
    pub warden: WardenConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            capture_width: 640,
            capture_height: 480,
            preview_path: None,
            monitor_off_command: default_monitor_off_command(),
            power_query_command: default_power_query_command(),
            probe_timeout_ms: 800,
            log_filter: "info".to_string(),
            warden: WardenConfig::default(),
        }
    }
}

#[cfg(windows)]
fn default_monitor_off_command() -> Vec<String> {
    // WM_SYSCOMMAND / SC_MONITORPOWER / 2 broadcast to all top-level windows.
    [
        "powershell",
        "-NoProfile",
        "-Command",
        "(Add-Type '[DllImport(\"user32.dll\")]public static extern int SendMessage(int h,int m,int w,int l);' -Name A -PassThru)::SendMessage(0xFFFF,0x0112,0xF170,2)",
    ]
    .map(String::from)
    .to_vec()
}

#[cfg(not(windows))]
fn default_monitor_off_command() -> Vec<String> {
    ["xset", "dpms", "force", "off"].map(String::from).to_vec()
}

#[cfg(windows)]
fn default_power_query_command() -> Vec<String> {
    ["powercfg", "/requests"].map(String::from).to_vec()
}

#[cfg(not(windows))]
fn default_power_query_command() -> Vec<String> {
    Vec::new()
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("loading config {}", path.display()))
    }

    pub fn from_toml_str(data: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(data)?;
        cfg.warden.validate()?;
        if cfg.capture_width == 0 || cfg.capture_height == 0 {
            bail!("capture size must be non-zero");
        }
        if cfg.monitor_off_command.is_empty() {
            bail!("monitor_off_command must name a program");
        }
        if cfg.probe_timeout_ms == 0 || cfg.probe_timeout() >= TICK_INTERVAL {
            bail!(
                "probe_timeout_ms must be within 1..{}, got {}",
                TICK_INTERVAL.as_millis(),
                cfg.probe_timeout_ms
            );
        }
        Ok(cfg)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}
