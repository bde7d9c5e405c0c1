// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Line-based console front end.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use super::{Notification, UiIntent};
use crate::events::{Event, EventSender};
use crate::machine::Mode;
use crate::state::AppState;

const HELP: &str = "\
Commands:
  sync        upload beacon records to the server
  check       ask the server whether this beacon had contact
  alert       report an exposure for this beacon
  devices     list serial ports
  select <n>  use serial port <n>
  refresh     re-scan serial ports
  status      show current state
  help        show this text
  quit        exit";

/// Console commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sync,
    Check,
    Alert,
    Devices,
    Select(usize),
    Refresh,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Returns `None` for blank or unknown input.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_ascii_lowercase();

    let parsed = match command.as_str() {
        "sync" | "s" => Command::Sync,
        "check" | "c" => Command::Check,
        "alert" | "a" => Command::Alert,
        "devices" | "ls" => Command::Devices,
        "select" => Command::Select(words.next()?.parse().ok()?),
        "refresh" | "r" => Command::Refresh,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => return None,
    };

    Some(parsed)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn describe(notification: &Notification) -> Option<String> {
    match notification {
        Notification::ModeChanged(mode) if mode.is_busy() || *mode == Mode::Idle => {
            Some(format!("[{}]", mode.label()))
        }
        Notification::ModeChanged(_) => None,
        Notification::Timeout(channel) => {
            Some(format!("Timed out waiting for the {}", channel))
        }
        Notification::ContactResult(result) => Some(result.to_string()),
        Notification::ChannelError {
            channel,
            kind,
            message,
        } => Some(format!("{} {} error: {}", channel, kind, message)),
        Notification::DevicesChanged { devices, .. } if devices.is_empty() => {
            Some("No serial devices found".to_string())
        }
        Notification::DevicesChanged { .. } => None,
    }
}

fn print_devices(state: &AppState) {
    let devices = state.get_devices();
    if devices.is_empty() {
        println!("No serial devices found");
        return;
    }

    let selected = *state.selected_device.read();
    for (index, device) in devices.iter().enumerate() {
        let marker = if Some(index) == selected { '*' } else { ' ' };
        println!("{} {}: {}", marker, index, device);
    }
}

/// Drive the machine from stdin until `quit`, end of input or Ctrl+C.
pub async fn run_console(
    state: Arc<AppState>,
    intents: EventSender,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut confirming_alert = false;

    println!("{}", HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Console input closed");
                    break;
                };

                if confirming_alert {
                    confirming_alert = false;
                    let _ = intents.send(Event::Intent(UiIntent::RequestAlertContact {
                        confirmed: is_yes(&line),
                    }));
                    continue;
                }

                let Some(command) = parse_command(&line) else {
                    if !line.trim().is_empty() {
                        println!("Unknown command, type 'help'");
                    }
                    continue;
                };

                let intent = match command {
                    Command::Help => {
                        println!("{}", HELP);
                        continue;
                    }
                    Command::Status => {
                        println!("{}", state.status_line());
                        continue;
                    }
                    Command::Devices => {
                        print_devices(&state);
                        continue;
                    }
                    Command::Quit => {
                        info!("Quit requested");
                        break;
                    }
                    _ if state.is_busy() => {
                        println!("Busy: {}", state.get_mode().label());
                        continue;
                    }
                    Command::Alert => {
                        println!("Report an exposure for this beacon to the server? [y/N]");
                        confirming_alert = true;
                        continue;
                    }
                    Command::Sync => UiIntent::RequestSync,
                    Command::Check => UiIntent::RequestCheckContact,
                    Command::Select(index) => UiIntent::SelectDevice(index),
                    Command::Refresh => UiIntent::RefreshDevices,
                };

                if intents.send(Event::Intent(intent)).is_err() {
                    break;
                }
            }
            Some(notification) = notifications.recv() => {
                state.apply(&notification);
                if let Some(text) = describe(&notification) {
                    println!("{}", text);
                }
                if matches!(notification, Notification::DevicesChanged { .. }) {
                    print_devices(&state);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelKind;
    use crate::machine::TransferStage;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("sync"), Some(Command::Sync));
        assert_eq!(parse_command("  CHECK "), Some(Command::Check));
        assert_eq!(parse_command("alert"), Some(Command::Alert));
        assert_eq!(parse_command("select 2"), Some(Command::Select(2)));
        assert_eq!(parse_command("q"), Some(Command::Quit));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("select"), None);
        assert_eq!(parse_command("select x"), None);
        assert_eq!(parse_command("upload"), None);
    }

    #[test]
    fn test_alert_confirmation() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
    }

    #[test]
    fn test_describe_skips_internal_stages() {
        assert!(describe(&Notification::ModeChanged(Mode::Transfer(TransferStage::Done))).is_some());
        assert!(describe(&Notification::ModeChanged(Mode::ServerTimeout)).is_none());
        assert_eq!(
            describe(&Notification::Timeout(ChannelKind::Serial)).as_deref(),
            Some("Timed out waiting for the serial")
        );
    }
}
