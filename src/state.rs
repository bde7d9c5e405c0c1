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

//! Application state management.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::machine::{Mode, TransferStage};
use crate::protocol::ContactResult;
use crate::serial::DeviceInfo;
use crate::ui::Notification;

/// What the UI knows about the machine, rebuilt from notifications.
#[derive(Debug)]
pub struct AppState {
    /// Mode last reported by the machine.
    pub mode: RwLock<Mode>,

    /// Serial ports from the last enumeration.
    pub devices: RwLock<Vec<DeviceInfo>>,

    /// Index into `devices` of the selected port.
    pub selected_device: RwLock<Option<usize>>,

    /// Result of the last contact check.
    pub last_contact: RwLock<Option<ContactResult>>,

    /// When the last transfer completed.
    pub last_sync: RwLock<Option<DateTime<Local>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: RwLock::new(Mode::Idle),
            devices: RwLock::new(Vec::new()),
            selected_device: RwLock::new(None),
            last_contact: RwLock::new(None),
            last_sync: RwLock::new(None),
        }
    }
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fold a notification into the state.
    pub fn apply(&self, notification: &Notification) {
        match notification {
            Notification::ModeChanged(mode) => {
                if *mode == Mode::Transfer(TransferStage::Done) {
                    *self.last_sync.write() = Some(Local::now());
                }
                *self.mode.write() = *mode;
            }
            Notification::ContactResult(result) => {
                *self.last_contact.write() = Some(*result);
            }
            Notification::DevicesChanged { devices, selected } => {
                *self.devices.write() = devices.clone();
                *self.selected_device.write() = *selected;
            }
            Notification::Timeout(_) | Notification::ChannelError { .. } => {}
        }
    }

    pub fn get_mode(&self) -> Mode {
        *self.mode.read()
    }

    /// Whether an operation is in progress and new requests must wait.
    pub fn is_busy(&self) -> bool {
        self.get_mode() != Mode::Idle
    }

    pub fn get_devices(&self) -> Vec<DeviceInfo> {
        self.devices.read().clone()
    }

    pub fn get_selected_device(&self) -> Option<DeviceInfo> {
        let selected = (*self.selected_device.read())?;
        self.devices.read().get(selected).cloned()
    }

    pub fn get_last_contact(&self) -> Option<ContactResult> {
        *self.last_contact.read()
    }

    pub fn get_last_sync(&self) -> Option<DateTime<Local>> {
        *self.last_sync.read()
    }

    /// One-line summary for the `status` command.
    pub fn status_line(&self) -> String {
        let device = self
            .get_selected_device()
            .map(|d| d.port_name)
            .unwrap_or_else(|| "no device".to_string());
        let synced = self
            .get_last_sync()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let contact = self
            .get_last_contact()
            .map(|c| c.as_str())
            .unwrap_or("not checked");

        format!(
            "{} | {} | last sync: {} | {}",
            self.get_mode().label(),
            device,
            synced,
            contact
        )
    }
}
