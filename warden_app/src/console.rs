use screen_warden::{ControlCommand, WardenHandle};
use std::io::BufRead;
use std::thread;
use tokio::sync::mpsc;
use tracing::{info, warn};

const HELP: &str = "commands: ref | enable | disable | toggle | camera on|off | set <field> <value> | status | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Control(ControlCommand),
    Set { field: String, value: String },
    Status,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<ConsoleCommand, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        ["ref"] => ConsoleCommand::Control(ControlCommand::CaptureReference),
        ["enable"] => ConsoleCommand::Control(ControlCommand::SetEnabled(true)),
        ["disable"] => ConsoleCommand::Control(ControlCommand::SetEnabled(false)),
        ["toggle"] => ConsoleCommand::Control(ControlCommand::ToggleEnabled),
        ["camera", "on"] => ConsoleCommand::Control(ControlCommand::StartCamera),
        ["camera", "off"] => ConsoleCommand::Control(ControlCommand::StopCamera),
        ["set", field, value] => ConsoleCommand::Set {
            field: field.to_string(),
            value: value.to_string(),
        },
        ["status"] => ConsoleCommand::Status,
        ["help"] | ["?"] => ConsoleCommand::Help,
        ["quit"] | ["exit"] => ConsoleCommand::Quit,
        _ => return Err(format!("unrecognized: {line:?}")),
    };
    Ok(command)
}

/// Reads `source` line by line on a plain thread. A blocked read never holds up
/// runtime shutdown; the channel closes at end of input.
pub fn spawn_line_reader(
    source: impl BufRead + Send + 'static,
) -> std::io::Result<mpsc::Receiver<String>> {
    let (lines_tx, lines_rx) = mpsc::channel(16);
    thread::Builder::new()
        .name("warden-console".into())
        .spawn(move || {
            for line in source.lines() {
                match line {
                    Ok(line) => {
                        if lines_tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%err, "console closed");
                        break;
                    }
                }
            }
        })?;
    Ok(lines_rx)
}

/// Handles console lines until `quit` or end of input.
pub async fn run(handle: WardenHandle, mut lines: mpsc::Receiver<String>) {
    println!("{HELP}");
    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        match parse(&line) {
            Ok(ConsoleCommand::Control(command)) => {
                handle.send(command);
            }
            Ok(ConsoleCommand::Set { field, value }) => {
                match handle.update_config(|cfg| cfg.set_field(&field, &value)) {
                    Ok(()) => info!(field, value, "setting changed"),
                    Err(err) => println!("{err}"),
                }
            }
            Ok(ConsoleCommand::Status) => println!("{}", handle.status()),
            Ok(ConsoleCommand::Help) => println!("{HELP}"),
            Ok(ConsoleCommand::Quit) => break,
            Err(msg) => println!("{msg}\n{HELP}"),
        }
    }
}
