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

//! Serial link to the beacon.
//!
//! [`SerialChannel`] is what the sync machine talks to. The bytes themselves
//! move through a [`SerialTransport`]: the `serialport` backed
//! [`SerialPortTransport`] in the application, [`MockSerial`] in tests.

mod buffer;
mod channel;
mod mock;
mod port;

pub use buffer::LineBuffer;
pub use channel::SerialChannel;
pub use mock::MockSerial;
pub use port::SerialPortTransport;

use std::fmt;

use crate::error::ChannelError;
use crate::events::Inbound;

/// A serial port the beacon may be attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub port_name: String,
    pub description: String,
}

impl DeviceInfo {
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.port_name, self.description)
    }
}

/// Byte-level access to a serial device.
///
/// `open` starts delivering inbound bytes through `inbound` from whatever
/// thread the transport reads on; the machine picks them up from its queue.
pub trait SerialTransport: Send {
    /// Enumerate ports a beacon could be attached to.
    fn available_ports(&self) -> Result<Vec<DeviceInfo>, ChannelError>;

    /// Open `port` and start reading.
    fn open(&mut self, port: &str, inbound: Inbound) -> Result<(), ChannelError>;

    /// Write raw bytes to the open port.
    fn write(&mut self, data: &[u8]) -> Result<(), ChannelError>;

    /// Stop reading and release the port. Must be safe to call repeatedly.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_display() {
        let device = DeviceInfo::new("/dev/ttyACM0", "Beacon v2");
        assert_eq!(device.to_string(), "/dev/ttyACM0 - Beacon v2");
    }
}
