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

//! Error types shared by the serial and server channels.

use std::fmt;

/// Errors raised by a channel transport.
///
/// Neither variant is fatal: the owning mode aborts its operation and the
/// machine returns to idle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The device or endpoint could not be reached or opened.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Reading or writing an open channel failed.
    #[error("I/O failure: {0}")]
    IoFailure(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        ChannelError::IoFailure(err.to_string())
    }
}

impl From<serialport::Error> for ChannelError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => ChannelError::DeviceUnavailable(err.description),
            _ => ChannelError::IoFailure(err.description),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChannelError::IoFailure(err.to_string())
    }
}

/// Which of the two links an event or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Serial,
    Server,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Serial => "serial",
            ChannelKind::Server => "server",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-visible category of a non-timeout abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The channel could not be opened or connected.
    ChannelOpen,
    /// An open channel failed while in use.
    ChannelIo,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ChannelOpen => "could not open channel",
            FailureKind::ChannelIo => "channel I/O failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
