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

//! Websocket transport using `tokio-tungstenite`.

use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use super::ServerTransport;
use crate::error::ChannelError;
use crate::events::{Inbound, ServerInput};

/// Websocket client running on a tokio task.
///
/// Outgoing frames go through an unbounded queue so `send_text` never
/// blocks the machine. Closing an established connection drops the queue;
/// the task flushes what is already queued, sends a close frame and exits.
/// Closing before the handshake completes aborts the task outright.
#[derive(Default)]
pub struct WebSocketTransport {
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
    established: Arc<AtomicBool>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn run(
        url: String,
        inbound: Inbound,
        mut outbound: mpsc::UnboundedReceiver<String>,
        established: Arc<AtomicBool>,
    ) {
        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                error!("Failed to connect to {}: {}", url, e);
                inbound.server(ServerInput::Failed(e.to_string()));
                return;
            }
        };

        info!("Websocket connected to {}", url);
        established.store(true, Ordering::Release);
        if !inbound.server(ServerInput::Connected) {
            return;
        }

        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                outgoing = outbound.recv() => match outgoing {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            error!("Websocket send failed: {}", e);
                            inbound.server(ServerInput::Failed(e.to_string()));
                            break;
                        }
                    }
                    None => {
                        debug!("Websocket session {} closing", inbound.session());
                        let _ = sink.close().await;
                        break;
                    }
                },
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        inbound.server(ServerInput::Text(text));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        inbound.server(ServerInput::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Websocket receive failed: {}", e);
                        inbound.server(ServerInput::Failed(e.to_string()));
                        break;
                    }
                },
            }
        }
    }
}

impl ServerTransport for WebSocketTransport {
    fn connect(&mut self, url: &str, inbound: Inbound) -> Result<(), ChannelError> {
        self.close();

        let (tx, rx) = mpsc::unbounded_channel();
        let established = Arc::new(AtomicBool::new(false));
        self.task = Some(tokio::spawn(Self::run(
            url.to_string(),
            inbound,
            rx,
            established.clone(),
        )));
        self.outbound = Some(tx);
        self.established = established;
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<(), ChannelError> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| ChannelError::IoFailure("websocket is not open".to_string()))?;
        outbound
            .send(text.to_string())
            .map_err(|_| ChannelError::IoFailure("websocket task has stopped".to_string()))
    }

    fn close(&mut self) {
        self.outbound = None;

        if let Some(task) = self.task.take() {
            if !self.established.load(Ordering::Acquire) {
                debug!("Abandoning websocket handshake");
                task.abort();
            }
        }
    }
}
