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

//! The single ordered event queue feeding the sync machine.
//!
//! Background I/O (the serial reader thread, the websocket task, timer tasks)
//! never touches machine state. It posts an [`Event`] and the machine task
//! handles events one at a time in arrival order.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ChannelKind;
use crate::ui::UiIntent;

/// Everything the machine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// User intent raised by the front end.
    Intent(UiIntent),
    /// Input from the serial link opened as `session`.
    Serial { session: u64, input: SerialInput },
    /// Input from the server link opened as `session`.
    Server { session: u64, input: ServerInput },
    /// A timer armed as `generation` ran out.
    TimerExpired { timer: ChannelKind, generation: u64 },
}

/// Raw input from the beacon link.
#[derive(Debug, Clone, PartialEq)]
pub enum SerialInput {
    /// Bytes read from the port, not yet split into lines.
    Data(Vec<u8>),
    /// The port failed while reading.
    Failed(String),
}

/// Raw input from the server link.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerInput {
    /// The websocket handshake completed.
    Connected,
    /// A text frame arrived.
    Text(String),
    /// Connecting or an open connection failed.
    Failed(String),
    /// The server closed the connection.
    Closed,
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create the machine's event queue.
pub fn event_queue() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Sender handed to a transport when a channel opens.
///
/// Every event it posts is stamped with the session the channel had at open
/// time, so input that arrives after a close is recognisably stale.
#[derive(Debug, Clone)]
pub struct Inbound {
    tx: EventSender,
    session: u64,
}

impl Inbound {
    pub fn new(tx: EventSender, session: u64) -> Self {
        Self { tx, session }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Post serial input. Returns `false` once the machine is gone.
    pub fn serial(&self, input: SerialInput) -> bool {
        self.post(Event::Serial {
            session: self.session,
            input,
        })
    }

    /// Post server input. Returns `false` once the machine is gone.
    pub fn server(&self, input: ServerInput) -> bool {
        self.post(Event::Server {
            session: self.session,
            input,
        })
    }

    fn post(&self, event: Event) -> bool {
        if self.tx.send(event).is_err() {
            debug!("Event queue closed, dropping input for session {}", self.session);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_stamps_session() {
        let (tx, mut rx) = event_queue();
        let inbound = Inbound::new(tx, 7);

        assert!(inbound.serial(SerialInput::Data(b"ts:1\n".to_vec())));
        assert!(inbound.server(ServerInput::Connected));

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::Serial {
                session: 7,
                input: SerialInput::Data(b"ts:1\n".to_vec())
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::Server {
                session: 7,
                input: ServerInput::Connected
            }
        );
    }

    #[test]
    fn test_inbound_reports_closed_queue() {
        let (tx, rx) = event_queue();
        let inbound = Inbound::new(tx, 1);
        drop(rx);

        assert!(!inbound.server(ServerInput::Closed));
    }
}
