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

//! Text-message channel to the sync server.

use tracing::{debug, info, warn};

use super::{Endpoint, ServerTransport};
use crate::error::{ChannelError, ChannelKind, FailureKind};
use crate::events::{EventSender, Inbound, ServerInput};
use crate::handler::{ConnectedHandler, ErrorHandler, HandlerSlot, TextHandler};
use crate::machine::Trigger;

/// Lifecycle of the server link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    Connecting,
    Connected,
}

/// Duplex text channel to the sync server.
pub struct ServerChannel<T: ServerTransport> {
    transport: T,
    events: EventSender,
    connected: HandlerSlot<ConnectedHandler>,
    texts: HandlerSlot<TextHandler>,
    errors: HandlerSlot<ErrorHandler>,
    session: u64,
    state: LinkState,
}

impl<T: ServerTransport> ServerChannel<T> {
    pub fn new(transport: T, events: EventSender) -> Self {
        Self {
            transport,
            events,
            connected: HandlerSlot::new(),
            texts: HandlerSlot::new(),
            errors: HandlerSlot::new(),
            session: 0,
            state: LinkState::Closed,
        }
    }

    /// Start connecting to `endpoint`. Completion is reported through the
    /// connected handler.
    pub fn connect(&mut self, endpoint: &Endpoint) -> Result<(), ChannelError> {
        self.close_transport();
        self.session += 1;

        info!("Connecting to server at {}", endpoint);
        self.transport
            .connect(&endpoint.url(), Inbound::new(self.events.clone(), self.session))?;
        self.state = LinkState::Connecting;
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != LinkState::Closed
    }

    pub fn send_text(&mut self, message: &str) -> Result<(), ChannelError> {
        if self.state != LinkState::Connected {
            return Err(ChannelError::IoFailure("server is not connected".to_string()));
        }

        debug!("Server <- {:?}", message);
        self.transport.send_text(message)
    }

    pub fn on_connected(&mut self, handler: ConnectedHandler) {
        self.connected.attach(handler);
    }

    pub fn clear_connected_handler(&mut self) {
        self.connected.detach();
    }

    /// Subscribe to text frames, replacing any previous subscriber.
    pub fn on_text_received(&mut self, handler: TextHandler) {
        self.texts.attach(handler);
    }

    pub fn has_text_handler(&self) -> bool {
        self.texts.is_attached()
    }

    pub fn on_error(&mut self, handler: ErrorHandler) {
        self.errors.attach(handler);
    }

    /// Whether input stamped with `session` belongs to the current link.
    pub fn accepts(&self, session: u64) -> bool {
        self.is_open() && session == self.session
    }

    /// Route transport input to the matching subscriber.
    pub fn handle(&mut self, input: ServerInput) -> Option<Trigger> {
        match input {
            ServerInput::Connected => {
                self.state = LinkState::Connected;
                info!("Server connection established");
                self.connected.get().map(|handler| handler())
            }
            ServerInput::Text(text) => {
                debug!("Server -> {:?}", text);
                match self.texts.get() {
                    Some(handler) => handler(&text),
                    None => {
                        debug!("No server subscriber, ignoring frame");
                        None
                    }
                }
            }
            ServerInput::Failed(message) => self.fail(message),
            ServerInput::Closed => self.fail("connection closed by server".to_string()),
        }
    }

    fn fail(&mut self, message: String) -> Option<Trigger> {
        let kind = match self.state {
            LinkState::Connecting => FailureKind::ChannelOpen,
            _ => FailureKind::ChannelIo,
        };
        warn!("Server link failed ({}): {}", kind, message);
        self.close_transport();
        self.errors
            .get()
            .map(|handler| handler(ChannelKind::Server, kind, message))
    }

    fn close_transport(&mut self) {
        if self.state != LinkState::Closed {
            self.transport.close();
            self.state = LinkState::Closed;
        }
    }

    /// Close the link and drop per-operation subscribers. Idempotent.
    pub fn close(&mut self) {
        self.connected.detach();
        self.texts.detach();

        if self.state != LinkState::Closed {
            self.close_transport();
            info!("Server connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{event_queue, Event};
    use crate::server::MockServer;

    fn connected() -> Trigger {
        Trigger::ServerConnected
    }

    fn verdict(frame: &str) -> Option<Trigger> {
        Some(Trigger::ContactReply(crate::protocol::ContactResult::from_reply(frame)))
    }

    fn failed(channel: ChannelKind, kind: FailureKind, message: String) -> Trigger {
        Trigger::ChannelFailed {
            channel,
            kind,
            message,
        }
    }

    fn next_input(rx: &mut crate::events::EventReceiver) -> (u64, ServerInput) {
        match rx.try_recv().unwrap() {
            Event::Server { session, input } => (session, input),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_connect_then_send() {
        let (tx, mut rx) = event_queue();
        let mock = MockServer::new();
        let mut channel = ServerChannel::new(mock.clone(), tx);
        channel.on_connected(connected);

        channel.connect(&Endpoint::default()).unwrap();
        assert_eq!(channel.state(), LinkState::Connecting);
        assert_eq!(mock.connected_url().as_deref(), Some("ws://localhost:6969"));

        // Not usable until the handshake completes
        assert!(channel.send_text("chk:ABC").is_err());

        mock.accept();
        let (session, input) = next_input(&mut rx);
        assert!(channel.accepts(session));
        assert_eq!(channel.handle(input), Some(Trigger::ServerConnected));

        channel.send_text("chk:ABC").unwrap();
        assert_eq!(mock.sent(), vec!["chk:ABC".to_string()]);
    }

    #[test]
    fn test_text_routed_to_single_subscriber() {
        let (tx, _rx) = event_queue();
        let mut channel = ServerChannel::new(MockServer::new(), tx);

        assert_eq!(channel.handle(ServerInput::Text("y".into())), None);

        channel.on_text_received(verdict);
        assert_eq!(
            channel.handle(ServerInput::Text("n".into())),
            Some(Trigger::ContactReply(crate::protocol::ContactResult::Negative))
        );
    }

    #[test]
    fn test_failure_while_connecting_is_open_failure() {
        let (tx, _rx) = event_queue();
        let mut channel = ServerChannel::new(MockServer::new(), tx);
        channel.on_error(failed);

        channel.connect(&Endpoint::default()).unwrap();
        let trigger = channel.handle(ServerInput::Failed("refused".into()));

        assert_eq!(
            trigger,
            Some(Trigger::ChannelFailed {
                channel: ChannelKind::Server,
                kind: FailureKind::ChannelOpen,
                message: "refused".to_string(),
            })
        );
        assert!(!channel.is_open());
    }

    #[test]
    fn test_close_after_connected_is_io_failure() {
        let (tx, _rx) = event_queue();
        let mut channel = ServerChannel::new(MockServer::new(), tx);
        channel.on_error(failed);

        channel.connect(&Endpoint::default()).unwrap();
        channel.handle(ServerInput::Connected);

        match channel.handle(ServerInput::Closed) {
            Some(Trigger::ChannelFailed { kind, .. }) => assert_eq!(kind, FailureKind::ChannelIo),
            other => panic!("unexpected trigger {:?}", other),
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let (tx, _rx) = event_queue();
        let mock = MockServer::new();
        let mut channel = ServerChannel::new(mock.clone(), tx);
        channel.on_text_received(verdict);

        channel.connect(&Endpoint::default()).unwrap();
        channel.close();
        channel.close();

        assert!(!channel.is_open());
        assert!(!channel.has_text_handler());
        assert_eq!(mock.close_count(), 1);
    }
}
