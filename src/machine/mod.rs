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

//! The sync protocol state machine.
//!
//! [`SyncMachine`] owns both channels and both timers. It consumes one
//! [`Event`] at a time, turns it into a [`Trigger`], asks [`Mode::next`]
//! where that leads and then runs the side effects of the move:
//!
//! 1. the trigger's own action (forward a record, send `chk:`, ...)
//! 2. exit of the old mode, if the top-level mode changes
//! 3. entry of the new mode or stage
//!
//! Actions may queue follow-up triggers (`GoHome`, `TimeoutReported`, channel
//! failures). They are drained before the next event is looked at.

mod mode;

pub use mode::{ContactStage, Mode, TransferStage, Trigger};

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ChannelError, ChannelKind, FailureKind};
use crate::events::{Event, EventReceiver, EventSender, SerialInput};
use crate::protocol::{self, BeaconTimestamp, ContactResult};
use crate::serial::{DeviceInfo, SerialChannel, SerialTransport};
use crate::server::{Endpoint, ServerChannel, ServerTransport};
use crate::timer::{TimerPair, SERIAL_TIMEOUT, SERVER_TIMEOUT};
use crate::ui::{Notifier, UiIntent};

/// Tunables of the machine, usually taken from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSettings {
    pub endpoint: Endpoint,
    pub server_timeout: Duration,
    pub serial_timeout: Duration,
    /// Port to select after enumeration, if present.
    pub preferred_port: Option<String>,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            server_timeout: SERVER_TIMEOUT,
            serial_timeout: SERIAL_TIMEOUT,
            preferred_port: None,
        }
    }
}

fn timestamp_line(line: &str) -> Option<Trigger> {
    protocol::parse_timestamp(line).map(Trigger::Timestamp)
}

fn uuid_line(line: &str) -> Option<Trigger> {
    protocol::parse_uuid(line).map(Trigger::Uuid)
}

fn record_line(line: &str) -> Option<Trigger> {
    if protocol::is_done(line) {
        Some(Trigger::Done)
    } else {
        Some(Trigger::Record(line.to_string()))
    }
}

fn contact_reply(frame: &str) -> Option<Trigger> {
    Some(Trigger::ContactReply(ContactResult::from_reply(frame)))
}

fn server_connected() -> Trigger {
    Trigger::ServerConnected
}

fn server_expired() -> Trigger {
    Trigger::ServerTimerExpired
}

fn serial_expired() -> Trigger {
    Trigger::SerialTimerExpired
}

fn channel_failed(channel: ChannelKind, kind: FailureKind, message: String) -> Trigger {
    Trigger::ChannelFailed {
        channel,
        kind,
        message,
    }
}

/// Orchestrates the beacon and server links through the operating modes.
pub struct SyncMachine<S: SerialTransport, W: ServerTransport> {
    mode: Mode,
    serial: SerialChannel<S>,
    server: ServerChannel<W>,
    timers: TimerPair,
    endpoint: Endpoint,
    devices: Vec<DeviceInfo>,
    selected: Option<usize>,
    preferred_port: Option<String>,
    timestamp: Option<BeaconTimestamp>,
    notifier: Box<dyn Notifier>,
    pending: VecDeque<Trigger>,
}

impl<S: SerialTransport, W: ServerTransport> SyncMachine<S, W> {
    /// Create an idle machine. Channels and timers post their input to
    /// `events`, which must feed back into [`SyncMachine::handle`].
    pub fn new(
        serial: S,
        server: W,
        events: EventSender,
        notifier: Box<dyn Notifier>,
        settings: MachineSettings,
    ) -> Self {
        let mut serial = SerialChannel::new(serial, events.clone());
        serial.on_error(channel_failed);

        let mut server = ServerChannel::new(server, events.clone());
        server.on_error(channel_failed);

        let mut timers = TimerPair::new(settings.server_timeout, settings.serial_timeout, events);
        timers.server.on_expire(server_expired);
        timers.serial.on_expire(serial_expired);

        Self {
            mode: Mode::Idle,
            serial,
            server,
            timers,
            endpoint: settings.endpoint,
            devices: Vec::new(),
            selected: None,
            preferred_port: settings.preferred_port,
            timestamp: None,
            notifier,
            pending: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn serial(&self) -> &SerialChannel<S> {
        &self.serial
    }

    pub fn server(&self) -> &ServerChannel<W> {
        &self.server
    }

    pub fn timers(&self) -> &TimerPair {
        &self.timers
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    pub fn selected_device(&self) -> Option<&DeviceInfo> {
        self.selected.and_then(|i| self.devices.get(i))
    }

    /// Timestamp of the transfer in progress, if the handshake got that far.
    pub fn beacon_timestamp(&self) -> Option<BeaconTimestamp> {
        self.timestamp
    }

    /// Process events until the task is aborted.
    ///
    /// The channels and timers hold senders of their own, so the queue never
    /// closes. Dropping the machine drops the transports, which releases the
    /// port and the socket.
    pub async fn run(mut self, mut events: EventReceiver) {
        info!("Sync machine running");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
    }

    /// Process a single event to completion.
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Intent(intent) => self.handle_intent(intent),
            Event::Serial { session, input } => self.handle_serial(session, input),
            Event::Server { session, input } => {
                if !self.server.accepts(session) {
                    debug!("Dropping server input from stale session {}", session);
                    return;
                }
                if let Some(trigger) = self.server.handle(input) {
                    self.fire(trigger);
                }
            }
            Event::TimerExpired { timer, generation } => {
                if let Some(trigger) = self.timers.get_mut(timer).expire(generation) {
                    self.fire(trigger);
                }
            }
        }
    }

    fn handle_intent(&mut self, intent: UiIntent) {
        debug!("Intent: {:?}", intent);
        match intent {
            UiIntent::RequestSync => self.fire(Trigger::RequestSync),
            UiIntent::RequestCheckContact => self.fire(Trigger::RequestCheckContact),
            UiIntent::RequestAlertContact { confirmed } => {
                self.fire(Trigger::RequestAlertContact { confirmed })
            }
            UiIntent::SelectDevice(index) => {
                if self.require_idle("select a device") {
                    self.select_device(index);
                }
            }
            UiIntent::RefreshDevices => {
                if self.require_idle("refresh devices") {
                    self.refresh_devices();
                }
            }
        }
    }

    fn require_idle(&self, what: &str) -> bool {
        if self.mode != Mode::Idle {
            warn!("Cannot {} while {}", what, self.mode);
            return false;
        }
        true
    }

    fn handle_serial(&mut self, session: u64, input: SerialInput) {
        if !self.serial.accepts(session) {
            debug!("Dropping serial input from stale session {}", session);
            return;
        }

        match input {
            SerialInput::Data(bytes) => {
                self.serial.feed(&bytes);
                // One line at a time: a line may change the subscriber for
                // the next one
                while self.serial.has_complete_line() {
                    let Some(line) = self.serial.read_line() else {
                        break;
                    };
                    debug!("Beacon -> {:?}", line);
                    if let Some(trigger) = self.serial.dispatch(&line) {
                        self.fire(trigger);
                    }
                }
            }
            SerialInput::Failed(message) => {
                if let Some(trigger) = self.serial.fail(message) {
                    self.fire(trigger);
                }
            }
        }
    }

    /// Re-enumerate serial ports, keeping the current selection if it is
    /// still present.
    pub fn refresh_devices(&mut self) {
        let previous = self
            .selected_device()
            .map(|d| d.port_name.clone())
            .or_else(|| self.preferred_port.clone());

        self.devices = match self.serial.available_ports() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        };

        self.selected = previous
            .and_then(|name| self.devices.iter().position(|d| d.port_name == name))
            .or(if self.devices.is_empty() { None } else { Some(0) });

        info!(
            "Found {} serial device(s), selected {:?}",
            self.devices.len(),
            self.selected_device().map(|d| d.port_name.as_str())
        );
        self.notifier.on_devices_changed(&self.devices, self.selected);
    }

    /// Select the device at `index` of the last enumeration.
    pub fn select_device(&mut self, index: usize) -> bool {
        if index >= self.devices.len() {
            warn!("No serial device at index {}", index);
            return false;
        }

        self.selected = Some(index);
        info!("Selected serial device {}", self.devices[index]);
        self.notifier.on_devices_changed(&self.devices, self.selected);
        true
    }

    /// Apply `trigger` and everything it sets off.
    pub fn fire(&mut self, trigger: Trigger) {
        self.pending.push_back(trigger);
        while let Some(trigger) = self.pending.pop_front() {
            self.step(trigger);
        }
    }

    fn step(&mut self, trigger: Trigger) {
        let previous = self.mode;
        let Some(next) = previous.next(&trigger) else {
            debug!("Ignoring {:?} in {}", trigger, previous);
            return;
        };

        self.act(previous, trigger);

        if !previous.same_kind(&next) {
            self.exit(previous);
        }

        if next != previous || next == Mode::Idle {
            self.mode = next;
            info!("Mode {} -> {}", previous, next);
            self.notifier.on_mode_changed(next);
            self.enter(next);
        }
    }

    /// Side effects belonging to the trigger itself.
    fn act(&mut self, previous: Mode, trigger: Trigger) {
        match trigger {
            Trigger::RequestAlertContact { confirmed: false } => {
                info!("Exposure alert not confirmed, nothing sent");
            }
            Trigger::ServerConnected => {
                self.timers.server.disarm();
                self.server.clear_connected_handler();
            }
            Trigger::Timestamp(timestamp) => {
                info!("Beacon timestamp {}", timestamp);
                self.timestamp = Some(timestamp);
                self.timers.serial.disarm();
                self.timers.serial.start();
            }
            Trigger::Uuid(uuid) => match previous {
                Mode::CheckContact(_) => {
                    self.timers.serial.disarm();
                    info!("Checking contact status for beacon {}", uuid);
                    self.send_to_server(protocol::check_frame(&uuid));
                }
                Mode::AlertContact(_) => {
                    self.timers.serial.disarm();
                    info!("Reporting exposure for beacon {}", uuid);
                    self.send_to_server(protocol::alert_frame(&uuid));
                }
                _ => debug!("Beacon {} starting record dump", uuid),
            },
            Trigger::Record(line) => self.send_to_server(protocol::record_frame(&line)),
            Trigger::Done => {
                self.send_to_server(protocol::DONE_FRAME.to_string());
                self.timers.serial.disarm();
                info!("Beacon transfer complete");
            }
            Trigger::ContactReply(result) => {
                self.timers.server.disarm();
                info!("Contact check result: {}", result);
                self.notifier.on_contact_result(result);
            }
            Trigger::ChannelFailed {
                channel,
                kind,
                message,
            } => {
                warn!("{} channel error ({}): {}", channel, kind, message);
                self.notifier.on_channel_error(channel, kind, &message);
            }
            _ => {}
        }
    }

    fn exit(&mut self, previous: Mode) {
        match previous {
            Mode::ServerConnect => {
                // The connection itself carries over into the transfer
                self.timers.server.disarm();
                self.server.clear_connected_handler();
            }
            Mode::Transfer(_) | Mode::CheckContact(_) | Mode::AlertContact(_) => {
                self.release_channels();
            }
            Mode::Idle | Mode::ServerTimeout | Mode::SerialTimeout => {}
        }
    }

    fn enter(&mut self, mode: Mode) {
        match mode {
            Mode::Idle => self.release_channels(),
            Mode::ServerConnect
            | Mode::CheckContact(ContactStage::AwaitingServer)
            | Mode::AlertContact(ContactStage::AwaitingServer) => self.connect_server(),
            Mode::Transfer(TransferStage::AwaitingTimestamp) => {
                self.start_serial(protocol::SYNC_COMMAND, timestamp_line)
            }
            Mode::Transfer(TransferStage::AwaitingUuid) => {
                self.serial.on_line_available(uuid_line)
            }
            Mode::Transfer(TransferStage::AwaitingRecords) => {
                self.serial.on_line_available(record_line)
            }
            Mode::CheckContact(ContactStage::AwaitingUuid)
            | Mode::AlertContact(ContactStage::AwaitingUuid) => {
                self.start_serial(protocol::UUID_COMMAND, uuid_line)
            }
            Mode::CheckContact(ContactStage::AwaitingVerdict)
            | Mode::AlertContact(ContactStage::AwaitingVerdict) => {
                self.serial.clear_line_handler();
                self.server.on_text_received(contact_reply);
                self.timers.server.start();
            }
            Mode::Transfer(TransferStage::Done)
            | Mode::CheckContact(ContactStage::Resolved)
            | Mode::AlertContact(ContactStage::Resolved) => {
                self.pending.push_back(Trigger::GoHome);
            }
            Mode::ServerTimeout => self.report_timeout(ChannelKind::Server),
            Mode::SerialTimeout => self.report_timeout(ChannelKind::Serial),
        }
    }

    fn connect_server(&mut self) {
        self.server.on_connected(server_connected);
        if let Err(e) = self.server.connect(&self.endpoint) {
            self.queue_failure(ChannelKind::Server, FailureKind::ChannelOpen, e);
            return;
        }
        self.timers.server.start();
    }

    fn start_serial(&mut self, command: &str, handler: crate::handler::LineHandler) {
        let Some(port) = self.selected_device().map(|d| d.port_name.clone()) else {
            self.queue_failure(
                ChannelKind::Serial,
                FailureKind::ChannelOpen,
                ChannelError::DeviceUnavailable("no serial device selected".to_string()),
            );
            return;
        };

        if let Err(e) = self.serial.open(&port) {
            self.queue_failure(ChannelKind::Serial, FailureKind::ChannelOpen, e);
            return;
        }
        if let Err(e) = self.serial.write_line(command) {
            self.queue_failure(ChannelKind::Serial, FailureKind::ChannelIo, e);
            return;
        }

        self.timers.serial.start();
        self.serial.on_line_available(handler);
    }

    fn send_to_server(&mut self, frame: String) {
        if let Err(e) = self.server.send_text(&frame) {
            self.queue_failure(ChannelKind::Server, FailureKind::ChannelIo, e);
        }
    }

    fn report_timeout(&mut self, channel: ChannelKind) {
        warn!("Timed out waiting on the {} channel", channel);
        self.notifier.on_timeout(channel);
        self.release_channels();
        self.pending.push_back(Trigger::TimeoutReported);
    }

    fn queue_failure(&mut self, channel: ChannelKind, kind: FailureKind, error: impl Display) {
        self.pending
            .push_back(channel_failed(channel, kind, error.to_string()));
    }

    /// Close both channels, stop both timers and forget the transfer.
    fn release_channels(&mut self) {
        self.serial.close();
        self.server.close();
        self.timers.disarm_all();
        self.timestamp = None;
    }
}
