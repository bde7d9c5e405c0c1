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

//! Line-oriented serial channel.

use tracing::{debug, info};

use super::{DeviceInfo, LineBuffer, SerialTransport};
use crate::error::{ChannelError, ChannelKind, FailureKind};
use crate::events::{EventSender, Inbound};
use crate::handler::{ErrorHandler, HandlerSlot, LineHandler};
use crate::machine::Trigger;

/// Duplex line channel to the beacon.
pub struct SerialChannel<T: SerialTransport> {
    transport: T,
    events: EventSender,
    buffer: LineBuffer,
    lines: HandlerSlot<LineHandler>,
    errors: HandlerSlot<ErrorHandler>,
    session: u64,
    port: Option<String>,
}

impl<T: SerialTransport> SerialChannel<T> {
    /// Create a closed channel posting its input to `events`.
    pub fn new(transport: T, events: EventSender) -> Self {
        Self {
            transport,
            events,
            buffer: LineBuffer::new(),
            lines: HandlerSlot::new(),
            errors: HandlerSlot::new(),
            session: 0,
            port: None,
        }
    }

    pub fn available_ports(&self) -> Result<Vec<DeviceInfo>, ChannelError> {
        self.transport.available_ports()
    }

    /// Open `port`, closing any previous connection first.
    pub fn open(&mut self, port: &str) -> Result<(), ChannelError> {
        self.close();
        self.session += 1;

        info!("Opening serial port {}", port);
        self.transport
            .open(port, Inbound::new(self.events.clone(), self.session))?;
        self.port = Some(port.to_string());
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Send `text` followed by a newline.
    pub fn write_line(&mut self, text: &str) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::IoFailure("serial port is not open".to_string()));
        }

        debug!("Serial <- {}", text);
        self.transport.write(format!("{}\n", text).as_bytes())
    }

    /// Subscribe to complete lines, replacing any previous subscriber.
    pub fn on_line_available(&mut self, handler: LineHandler) {
        self.lines.attach(handler);
    }

    pub fn clear_line_handler(&mut self) {
        self.lines.detach();
    }

    pub fn has_line_handler(&self) -> bool {
        self.lines.is_attached()
    }

    /// Subscribe to asynchronous read failures.
    pub fn on_error(&mut self, handler: ErrorHandler) {
        self.errors.attach(handler);
    }

    /// Whether input stamped with `session` belongs to the open port.
    pub fn accepts(&self, session: u64) -> bool {
        self.is_open() && session == self.session
    }

    /// Buffer bytes read from the port.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.push(bytes);
    }

    pub fn has_complete_line(&self) -> bool {
        self.buffer.has_complete_line()
    }

    /// Consume one buffered line. Only yields when `has_complete_line` holds.
    pub fn read_line(&mut self) -> Option<String> {
        self.buffer.read_line()
    }

    /// Hand a line to the current subscriber.
    pub fn dispatch(&self, line: &str) -> Option<Trigger> {
        match self.lines.get() {
            Some(handler) => handler(line),
            None => {
                debug!("No serial subscriber, ignoring line: {}", line);
                None
            }
        }
    }

    /// Report a read failure to the error subscriber.
    pub fn fail(&self, message: String) -> Option<Trigger> {
        self.errors
            .get()
            .map(|handler| handler(ChannelKind::Serial, FailureKind::ChannelIo, message))
    }

    /// Release the port. Safe on an already closed channel.
    pub fn close(&mut self) {
        self.lines.detach();
        self.buffer.clear();

        if let Some(port) = self.port.take() {
            self.transport.close();
            info!("Serial port {} closed", port);
        }
    }
}
