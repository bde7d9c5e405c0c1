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

//! User-facing surface: intents going in, notifications coming out.

mod console;

pub use console::{parse_command, run_console, Command};

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{ChannelKind, FailureKind};
use crate::machine::Mode;
use crate::protocol::ContactResult;
use crate::serial::DeviceInfo;

/// Requests the user can make of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiIntent {
    RequestSync,
    RequestCheckContact,
    /// `confirmed` is the answer to the "really report exposure?" prompt.
    RequestAlertContact { confirmed: bool },
    SelectDevice(usize),
    RefreshDevices,
}

/// Something the machine wants the user to know.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ModeChanged(Mode),
    Timeout(ChannelKind),
    ContactResult(ContactResult),
    ChannelError {
        channel: ChannelKind,
        kind: FailureKind,
        message: String,
    },
    DevicesChanged {
        devices: Vec<DeviceInfo>,
        selected: Option<usize>,
    },
}

/// Receiver of machine notifications.
pub trait Notifier: Send {
    fn on_mode_changed(&mut self, mode: Mode);

    fn on_timeout(&mut self, channel: ChannelKind);

    fn on_contact_result(&mut self, result: ContactResult);

    fn on_channel_error(&mut self, channel: ChannelKind, kind: FailureKind, message: &str);

    fn on_devices_changed(&mut self, devices: &[DeviceInfo], selected: Option<usize>);
}

/// Forwards notifications to the UI task.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    fn send(&self, notification: Notification) {
        // The UI may already be gone during shutdown
        let _ = self.tx.send(notification);
    }
}

impl Notifier for ChannelNotifier {
    fn on_mode_changed(&mut self, mode: Mode) {
        self.send(Notification::ModeChanged(mode));
    }

    fn on_timeout(&mut self, channel: ChannelKind) {
        self.send(Notification::Timeout(channel));
    }

    fn on_contact_result(&mut self, result: ContactResult) {
        self.send(Notification::ContactResult(result));
    }

    fn on_channel_error(&mut self, channel: ChannelKind, kind: FailureKind, message: &str) {
        self.send(Notification::ChannelError {
            channel,
            kind,
            message: message.to_string(),
        });
    }

    fn on_devices_changed(&mut self, devices: &[DeviceInfo], selected: Option<usize>) {
        self.send(Notification::DevicesChanged {
            devices: devices.to_vec(),
            selected,
        });
    }
}

/// Keeps every notification, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    log: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().clone()
    }

    /// Mode changes only, in order.
    pub fn modes(&self) -> Vec<Mode> {
        self.log
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::ModeChanged(mode) => Some(*mode),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }

    fn push(&self, notification: Notification) {
        self.log.lock().push(notification);
    }
}

impl Notifier for RecordingNotifier {
    fn on_mode_changed(&mut self, mode: Mode) {
        self.push(Notification::ModeChanged(mode));
    }

    fn on_timeout(&mut self, channel: ChannelKind) {
        self.push(Notification::Timeout(channel));
    }

    fn on_contact_result(&mut self, result: ContactResult) {
        self.push(Notification::ContactResult(result));
    }

    fn on_channel_error(&mut self, channel: ChannelKind, kind: FailureKind, message: &str) {
        self.push(Notification::ChannelError {
            channel,
            kind,
            message: message.to_string(),
        });
    }

    fn on_devices_changed(&mut self, devices: &[DeviceInfo], selected: Option<usize>) {
        self.push(Notification::DevicesChanged {
            devices: devices.to_vec(),
            selected,
        });
    }
}
