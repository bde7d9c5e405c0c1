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

//! Serial transport backed by the `serialport` crate.

use serialport::{SerialPort, SerialPortType};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{DeviceInfo, SerialTransport};
use crate::error::ChannelError;
use crate::events::{Inbound, SerialInput};

/// Read timeout of the background reader; bounds how long close takes to
/// stop it.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Real serial port. Reads happen on a dedicated thread.
pub struct SerialPortTransport {
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
    stop: Option<Arc<AtomicBool>>,
}

impl SerialPortTransport {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            port: None,
            stop: None,
        }
    }

    fn describe(port_type: &SerialPortType) -> String {
        match port_type {
            SerialPortType::UsbPort(usb) => usb
                .product
                .clone()
                .or_else(|| usb.manufacturer.clone())
                .unwrap_or_else(|| format!("USB {:04x}:{:04x}", usb.vid, usb.pid)),
            SerialPortType::PciPort => "PCI serial".to_string(),
            SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
            SerialPortType::Unknown => "Unknown".to_string(),
        }
    }

    fn spawn_reader(mut reader: Box<dyn SerialPort>, inbound: Inbound, stop: Arc<AtomicBool>) {
        std::thread::spawn(move || {
            let mut buf = [0u8; 256];

            while !stop.load(Ordering::Acquire) {
                match reader.read(&mut buf) {
                    Ok(0) => continue,
                    Ok(n) => {
                        if !inbound.serial(SerialInput::Data(buf[..n].to_vec())) {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                    Err(e) => {
                        if !stop.load(Ordering::Acquire) {
                            error!("Serial read error: {}", e);
                            inbound.serial(SerialInput::Failed(e.to_string()));
                        }
                        break;
                    }
                }
            }

            debug!("Serial reader for session {} stopped", inbound.session());
        });
    }
}

impl SerialTransport for SerialPortTransport {
    fn available_ports(&self) -> Result<Vec<DeviceInfo>, ChannelError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| {
                let description = Self::describe(&p.port_type);
                DeviceInfo::new(p.port_name, description)
            })
            .collect())
    }

    fn open(&mut self, port_name: &str, inbound: Inbound) -> Result<(), ChannelError> {
        self.close();

        let port = serialport::new(port_name, self.baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|e| {
                ChannelError::DeviceUnavailable(format!(
                    "failed to open serial port {}: {}",
                    port_name, e
                ))
            })?;

        let reader = port.try_clone()?;
        let stop = Arc::new(AtomicBool::new(false));
        Self::spawn_reader(reader, inbound, stop.clone());

        info!("Serial port {} open at {} baud", port_name, self.baud_rate);
        self.port = Some(port);
        self.stop = Some(stop);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| ChannelError::IoFailure("serial port is not open".to_string()))?;
        port.write_all(data)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Release);
        }
        self.port = None;
    }
}

impl Drop for SerialPortTransport {
    fn drop(&mut self) {
        self.close();
    }
}
