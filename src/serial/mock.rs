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

//! In-memory serial transport for tests.
//!
//! Clones share state, so a test keeps one handle to play the beacon while
//! the channel owns the other.

use parking_lot::Mutex;
use std::sync::Arc;

use super::{DeviceInfo, SerialTransport};
use crate::error::ChannelError;
use crate::events::{Inbound, SerialInput};

#[derive(Debug, Clone, Default)]
pub struct MockSerial {
    inner: Arc<Mutex<MockSerialInner>>,
}

#[derive(Debug, Default)]
struct MockSerialInner {
    ports: Vec<DeviceInfo>,
    inbound: Option<Inbound>,
    opened: Vec<String>,
    written: Vec<String>,
    close_count: usize,
    fail_next_open: Option<String>,
    fail_next_write: Option<String>,
    fail_ports: Option<String>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that reports the given ports as available.
    pub fn with_ports(ports: Vec<DeviceInfo>) -> Self {
        let mock = Self::new();
        mock.set_ports(ports);
        mock
    }

    pub fn set_ports(&self, ports: Vec<DeviceInfo>) {
        self.inner.lock().ports = ports;
    }

    /// Play the beacon: deliver raw bytes as if read from the port.
    ///
    /// Returns `false` when the port is not open.
    pub fn emit(&self, bytes: &[u8]) -> bool {
        let inner = self.inner.lock();
        match &inner.inbound {
            Some(inbound) => inbound.serial(SerialInput::Data(bytes.to_vec())),
            None => false,
        }
    }

    /// Deliver one newline-terminated line.
    pub fn emit_line(&self, line: &str) -> bool {
        self.emit(format!("{}\n", line).as_bytes())
    }

    /// Simulate the port failing under the reader.
    pub fn emit_failure(&self, message: &str) -> bool {
        let inner = self.inner.lock();
        match &inner.inbound {
            Some(inbound) => inbound.serial(SerialInput::Failed(message.to_string())),
            None => false,
        }
    }

    pub fn fail_next_open(&self, error: &str) {
        self.inner.lock().fail_next_open = Some(error.to_string());
    }

    pub fn fail_next_write(&self, error: &str) {
        self.inner.lock().fail_next_write = Some(error.to_string());
    }

    pub fn fail_port_listing(&self, error: &str) {
        self.inner.lock().fail_ports = Some(error.to_string());
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().inbound.is_some()
    }

    /// Ports opened so far, in order.
    pub fn opened_ports(&self) -> Vec<String> {
        self.inner.lock().opened.clone()
    }

    /// Everything written to the port, one entry per write.
    pub fn written(&self) -> Vec<String> {
        self.inner.lock().written.clone()
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().close_count
    }
}

impl SerialTransport for MockSerial {
    fn available_ports(&self) -> Result<Vec<DeviceInfo>, ChannelError> {
        let inner = self.inner.lock();
        if let Some(error) = &inner.fail_ports {
            return Err(ChannelError::IoFailure(error.clone()));
        }
        Ok(inner.ports.clone())
    }

    fn open(&mut self, port: &str, inbound: Inbound) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();

        if let Some(error) = inner.fail_next_open.take() {
            return Err(ChannelError::DeviceUnavailable(error));
        }

        inner.opened.push(port.to_string());
        inner.inbound = Some(inbound);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();

        if inner.inbound.is_none() {
            return Err(ChannelError::IoFailure("port not open".to_string()));
        }
        if let Some(error) = inner.fail_next_write.take() {
            return Err(ChannelError::IoFailure(error));
        }

        inner.written.push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        if inner.inbound.take().is_some() {
            inner.close_count += 1;
        }
    }
}
