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

//! In-memory server transport for tests.

use parking_lot::Mutex;
use std::sync::Arc;

use super::ServerTransport;
use crate::error::ChannelError;
use crate::events::{Inbound, ServerInput};

/// Records frames sent to the server and lets a test play the server side.
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    inner: Arc<Mutex<MockServerInner>>,
}

#[derive(Debug, Default)]
struct MockServerInner {
    inbound: Option<Inbound>,
    connected_url: Option<String>,
    connect_count: usize,
    sent: Vec<String>,
    close_count: usize,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn post(&self, input: ServerInput) -> bool {
        let inner = self.inner.lock();
        match &inner.inbound {
            Some(inbound) => inbound.server(input),
            None => false,
        }
    }

    /// Complete the pending websocket handshake.
    pub fn accept(&self) -> bool {
        self.post(ServerInput::Connected)
    }

    /// Reject the pending handshake.
    pub fn refuse(&self, reason: &str) -> bool {
        self.post(ServerInput::Failed(reason.to_string()))
    }

    /// Send a text frame to the client.
    pub fn reply(&self, text: &str) -> bool {
        self.post(ServerInput::Text(text.to_string()))
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) -> bool {
        self.post(ServerInput::Closed)
    }

    pub fn fail_next_connect(&self, error: &str) {
        self.inner.lock().fail_next_connect = Some(error.to_string());
    }

    pub fn fail_next_send(&self, error: &str) {
        self.inner.lock().fail_next_send = Some(error.to_string());
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().inbound.is_some()
    }

    pub fn connected_url(&self) -> Option<String> {
        self.inner.lock().connected_url.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.inner.lock().connect_count
    }

    /// Frames sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().sent.clone()
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().close_count
    }
}

impl ServerTransport for MockServer {
    fn connect(&mut self, url: &str, inbound: Inbound) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(ChannelError::DeviceUnavailable(error));
        }

        inner.connect_count += 1;
        inner.connected_url = Some(url.to_string());
        inner.inbound = Some(inbound);
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock();

        if inner.inbound.is_none() {
            return Err(ChannelError::IoFailure("not connected".to_string()));
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(ChannelError::IoFailure(error));
        }

        inner.sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        if inner.inbound.take().is_some() {
            inner.close_count += 1;
        }
    }
}
