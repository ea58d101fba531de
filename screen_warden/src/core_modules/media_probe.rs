// THEORY:
// The media-activity probe asks the OS which power requests are currently held.
// Video players keep a "display" request while playing; browsers usually hold an
// "execution" request instead. Either one means somebody is probably watching,
// which vetoes auto-off.
//
// The probe is a fail-safe: any failure (missing tool, timeout, garbage output)
// reads as "no activity", so a broken probe can only ever *allow* power-down,
// never stall the tick or keep the screen on forever.

use crate::error::{Result, WardenError};
use std::future::Future;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

const DISPLAY_HEADERS: &[&str] = &["DISPLAY", "ДИСПЛЕЙ"];
const EXECUTION_HEADERS: &[&str] = &["EXECUTION", "ВЫПОЛНЕНИЕ"];
const NONE_SENTINELS: &[&str] = &["", "None", "None.", "Нет.", "Нет"];

/// Something that can return the raw power-request report.
pub trait PowerRequestSource: Send + Sync {
    fn query(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Runs an external command (e.g. `powercfg /requests`) and returns its stdout.
#[derive(Debug, Clone)]
pub struct CommandPowerRequests {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandPowerRequests {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `powercfg /requests`, the Windows source of power-request state.
    pub fn powercfg(timeout: Duration) -> Self {
        Self::new("powercfg", vec!["/requests".to_string()], timeout)
    }
}

impl PowerRequestSource for CommandPowerRequests {
    async fn query(&self) -> Result<String> {
        let run = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| WardenError::ProbeTimeout(self.timeout))??;
        if !output.status.success() {
            return Err(WardenError::ProbeExit(output.status));
        }
        Ok(decode_console_output(&output.stdout))
    }
}

/// A source for platforms with no power-request reporting. Always empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPowerRequests;

impl PowerRequestSource for NoPowerRequests {
    async fn query(&self) -> Result<String> {
        Ok(String::new())
    }
}

/// The parsed state of the two request categories that matter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaActivity {
    pub display: bool,
    pub execution: bool,
}

impl MediaActivity {
    pub fn parse(report: &str) -> Self {
        let mut activity = Self::default();
        for (header, body) in sections(report) {
            let active = !NONE_SENTINELS.contains(&body.trim());
            if DISPLAY_HEADERS.contains(&header) {
                activity.display |= active;
            } else if EXECUTION_HEADERS.contains(&header) {
                activity.execution |= active;
            }
        }
        activity
    }

    pub fn is_active(&self) -> bool {
        self.display || self.execution
    }
}

/// Polls a `PowerRequestSource` once per tick and degrades failures to `false`.
#[derive(Debug, Clone)]
pub struct MediaActivityProbe<S> {
    source: S,
}

impl<S: PowerRequestSource> MediaActivityProbe<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn poll(&self) -> bool {
        match self.source.query().await {
            Ok(report) => {
                let activity = MediaActivity::parse(&report);
                trace!(?activity, "power requests");
                activity.is_active()
            }
            Err(err) => {
                debug!(%err, "power request query failed; treating as no media activity");
                false
            }
        }
    }
}

/// A header line is at least three uppercase letters followed by a colon.
fn header_of(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = line.split_once(':')?;
    let is_upper = |c: char| c.is_ascii_uppercase() || ('А'..='Я').contains(&c) || c == 'Ё';
    (name.chars().count() >= 3 && name.chars().all(is_upper)).then_some((name, rest))
}

/// Splits a report into `(HEADER, body)` pairs. Text before the first header is ignored.
fn sections(report: &str) -> Vec<(&str, String)> {
    let mut out: Vec<(&str, String)> = Vec::new();
    for line in report.lines() {
        if let Some((name, rest)) = header_of(line) {
            out.push((name, rest.trim().to_string()));
        } else if let Some((_, body)) = out.last_mut() {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(line.trim());
        }
    }
    out
}

/// Decodes console output as UTF-8, falling back to the CP866 OEM code page.
pub fn decode_console_output(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| cp866_char(b)).collect(),
    }
}

fn cp866_char(byte: u8) -> char {
    let code = match byte {
        0x00..=0x7F => byte as u32,
        0x80..=0xAF => 0x0410 + (byte - 0x80) as u32,
        0xE0..=0xEF => 0x0440 + (byte - 0xE0) as u32,
        0xF0 => 0x0401,
        0xF1 => 0x0451,
        _ => return '?',
    };
    char::from_u32(code).unwrap_or('?')
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE_REPORT: &str = "DISPLAY:\nNone.\n\nSYSTEM:\nNone.\n\nAWAYMODE:\nNone.\n\nEXECUTION:\nNone.\n\nPERFBOOST:\nNone.\n\nACTIVELOCKSCREEN:\nNone.\n";

    const PLAYER_REPORT: &str = "DISPLAY:\n[PROCESS] \\Device\\HarddiskVolume3\\Program Files\\VideoLAN\\VLC\\vlc.exe\nPlaying video\n\nSYSTEM:\nNone.\n\nEXECUTION:\nNone.\n";

    const BROWSER_REPORT_RU: &str = "ДИСПЛЕЙ:\nНет.\n\nСИСТЕМА:\nНет.\n\nВЫПОЛНЕНИЕ:\n[PROCESS] \\Device\\HarddiskVolume3\\Program Files\\Google\\Chrome\\Application\\chrome.exe\nPlaying audio\n";

    #[test]
    fn idle_report_is_inactive() {
        let activity = MediaActivity::parse(IDLE_REPORT);
        assert_eq!(activity, MediaActivity::default());
        assert!(!activity.is_active());
    }

    #[test]
    fn display_request_is_active() {
        let activity = MediaActivity::parse(PLAYER_REPORT);
        assert!(activity.display);
        assert!(!activity.execution);
        assert!(activity.is_active());
    }

    #[test]
    fn localized_execution_request_is_active() {
        let activity = MediaActivity::parse(BROWSER_REPORT_RU);
        assert!(!activity.display);
        assert!(activity.execution);
    }

    #[test]
    fn missing_categories_are_inactive() {
        assert!(!MediaActivity::parse("").is_active());
        assert!(!MediaActivity::parse("something went wrong").is_active());
    }

    #[test]
    fn body_on_header_line_is_kept() {
        assert!(MediaActivity::parse("DISPLAY: [DRIVER] HDMI audio\n").display);
        assert!(!MediaActivity::parse("DISPLAY: None.\n").display);
    }

    #[test]
    fn process_lines_are_not_headers() {
        assert!(header_of("[PROCESS] C:\\tools\\x.exe").is_none());
        assert!(header_of("AB: too short").is_none());
        assert_eq!(header_of("EXECUTION:"), Some(("EXECUTION", "")));
    }

    #[test]
    fn cp866_bytes_decode_to_cyrillic() {
        // "Нет." in CP866.
        let bytes = [0x8D, 0xA5, 0xE2, 0x2E, 0xFF];
        assert_eq!(decode_console_output(&bytes), "Нет.?");
    }

    struct Failing;

    impl PowerRequestSource for Failing {
        async fn query(&self) -> Result<String> {
            Err(WardenError::ProbeTimeout(Duration::from_secs(3)))
        }
    }

    struct Canned(&'static str);

    impl PowerRequestSource for Canned {
        async fn query(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn failing_source_reads_as_inactive() {
        assert!(!MediaActivityProbe::new(Failing).poll().await);
    }

    #[tokio::test]
    async fn probe_reports_parsed_activity() {
        assert!(MediaActivityProbe::new(Canned(PLAYER_REPORT)).poll().await);
        assert!(!MediaActivityProbe::new(Canned(IDLE_REPORT)).poll().await);
        assert!(!MediaActivityProbe::new(NoPowerRequests).poll().await);
    }

    #[tokio::test]
    async fn missing_program_is_an_error_not_a_panic() {
        let source = CommandPowerRequests::new(
            "screen-warden-no-such-program",
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(source.query().await.is_err());
        assert!(!MediaActivityProbe::new(source).poll().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_query_times_out() {
        let source = CommandPowerRequests::new(
            "sleep",
            vec!["5".to_string()],
            Duration::from_millis(100),
        );
        assert!(matches!(
            source.query().await,
            Err(WardenError::ProbeTimeout(_))
        ));
    }
}
