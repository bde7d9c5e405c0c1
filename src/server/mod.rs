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

//! Websocket link to the sync server.

mod channel;
mod mock;
mod websocket;

pub use channel::{LinkState, ServerChannel};
pub use mock::MockServer;
pub use websocket::WebSocketTransport;

use std::fmt;

use crate::error::ChannelError;
use crate::events::Inbound;

/// Default sync server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default sync server port.
pub const DEFAULT_PORT: u16 = 6969;

/// Address of the sync server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Websocket URL, `ws://<host>:<port>`.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Text-frame access to the sync server.
///
/// `connect` only starts the handshake; completion or failure arrives later
/// through `inbound` as [`ServerInput`](crate::events::ServerInput) events.
pub trait ServerTransport: Send {
    fn connect(&mut self, url: &str, inbound: Inbound) -> Result<(), ChannelError>;

    /// Queue a text frame. Frames queued before `close` are still delivered.
    fn send_text(&mut self, text: &str) -> Result<(), ChannelError>;

    /// Drop the connection. Must be safe to call repeatedly.
    fn close(&mut self);
}
