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

//! Single-subscriber handler slot.
//!
//! Channels and timers hold at most one handler per event kind. Attaching a
//! new handler silently replaces the old one, so a line can never be
//! delivered to two transfer stages.

use crate::error::{ChannelKind, FailureKind};
use crate::machine::Trigger;

/// Maps a received serial line to a machine trigger.
pub type LineHandler = fn(&str) -> Option<Trigger>;

/// Maps a received server text frame to a machine trigger.
pub type TextHandler = fn(&str) -> Option<Trigger>;

/// Produces the trigger for a completed server connection.
pub type ConnectedHandler = fn() -> Trigger;

/// Produces the trigger for an expired timer.
pub type ExpireHandler = fn() -> Trigger;

/// Produces the trigger for an asynchronous channel failure.
pub type ErrorHandler = fn(ChannelKind, FailureKind, String) -> Trigger;

/// Holds the currently attached handler, if any.
#[derive(Debug, Clone, Copy)]
pub struct HandlerSlot<H: Copy> {
    current: Option<H>,
}

impl<H: Copy> Default for HandlerSlot<H> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<H: Copy> HandlerSlot<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler, returning the one it replaced.
    pub fn attach(&mut self, handler: H) -> Option<H> {
        self.current.replace(handler)
    }

    /// Detach the current handler. Safe to call when empty.
    pub fn detach(&mut self) -> Option<H> {
        self.current.take()
    }

    pub fn get(&self) -> Option<H> {
        self.current
    }

    pub fn is_attached(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(_: &str) -> Option<u8> {
        Some(1)
    }

    fn second(_: &str) -> Option<u8> {
        Some(2)
    }

    #[test]
    fn test_attach_replaces_previous() {
        let mut slot: HandlerSlot<fn(&str) -> Option<u8>> = HandlerSlot::new();
        assert!(slot.attach(first).is_none());

        let replaced = slot.attach(second).map(|h| h("line"));
        assert_eq!(replaced, Some(Some(1)));

        // Only the latest subscriber sees the event
        assert_eq!(slot.get().and_then(|h| h("line")), Some(2));
    }

    #[test]
    fn test_detach_is_idempotent() {
        let mut slot: HandlerSlot<fn(&str) -> Option<u8>> = HandlerSlot::new();
        slot.attach(first);

        assert!(slot.detach().is_some());
        assert!(slot.detach().is_none());
        assert!(!slot.is_attached());
    }
}
