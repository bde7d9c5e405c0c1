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

//! One-shot timeout timers, one per channel.
//!
//! A timer task only posts [`Event::TimerExpired`] with the generation it was
//! armed under. Disarming bumps the generation, so an expiry that is already
//! sitting in the queue is rejected when the machine gets to it.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::ChannelKind;
use crate::events::{Event, EventSender};
use crate::handler::{ExpireHandler, HandlerSlot};
use crate::machine::Trigger;

/// Default time allowed for the server to answer.
pub const SERVER_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default time allowed for the beacon to answer.
pub const SERIAL_TIMEOUT: Duration = Duration::from_millis(20000);

/// A single one-shot timer.
pub struct TimerHandle {
    channel: ChannelKind,
    timeout: Duration,
    events: EventSender,
    generation: u64,
    task: Option<JoinHandle<()>>,
    handler: HandlerSlot<ExpireHandler>,
}

impl TimerHandle {
    /// Create a disarmed timer whose `start` uses `timeout`.
    pub fn new(channel: ChannelKind, timeout: Duration, events: EventSender) -> Self {
        Self {
            channel,
            timeout,
            events,
            generation: 0,
            task: None,
            handler: HandlerSlot::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    pub fn on_expire(&mut self, handler: ExpireHandler) {
        self.handler.attach(handler);
    }

    /// Arm for `duration`, replacing any pending expiry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, duration: Duration) {
        self.cancel_task();
        self.generation += 1;

        let generation = self.generation;
        let timer = self.channel;
        let events = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = events.send(Event::TimerExpired { timer, generation });
        }));

        debug!("{} timer armed for {:?}", self.channel, duration);
    }

    /// Arm with the configured timeout.
    pub fn start(&mut self) {
        self.arm(self.timeout);
    }

    /// Stop the timer. Has no effect on a disarmed timer.
    pub fn disarm(&mut self) {
        if self.cancel_task() {
            self.generation += 1;
            debug!("{} timer disarmed", self.channel);
        }
    }

    /// Accept an expiry event, yielding the expire trigger only if it
    /// belongs to the current arming.
    pub fn expire(&mut self, generation: u64) -> Option<Trigger> {
        if !self.is_armed() || generation != self.generation {
            debug!(
                "Ignoring stale {} timer expiry (generation {}, current {})",
                self.channel, generation, self.generation
            );
            return None;
        }

        self.task = None;
        self.handler.get().map(|handler| handler())
    }

    fn cancel_task(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

/// The server and serial timers.
pub struct TimerPair {
    pub server: TimerHandle,
    pub serial: TimerHandle,
}

impl TimerPair {
    pub fn new(server_timeout: Duration, serial_timeout: Duration, events: EventSender) -> Self {
        Self {
            server: TimerHandle::new(ChannelKind::Server, server_timeout, events.clone()),
            serial: TimerHandle::new(ChannelKind::Serial, serial_timeout, events),
        }
    }

    pub fn get_mut(&mut self, channel: ChannelKind) -> &mut TimerHandle {
        match channel {
            ChannelKind::Server => &mut self.server,
            ChannelKind::Serial => &mut self.serial,
        }
    }

    pub fn disarm_all(&mut self) {
        self.server.disarm();
        self.serial.disarm();
    }

    pub fn armed_count(&self) -> usize {
        [self.server.is_armed(), self.serial.is_armed()]
            .iter()
            .filter(|armed| **armed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_queue;

    fn server_expired() -> Trigger {
        Trigger::ServerTimerExpired
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_fires_after_timeout() {
        let (tx, mut rx) = event_queue();
        let mut timer = TimerHandle::new(ChannelKind::Server, SERVER_TIMEOUT, tx);
        timer.on_expire(server_expired);

        let started = tokio::time::Instant::now();
        timer.start();
        assert!(timer.is_armed());

        let event = rx.recv().await.unwrap();
        assert!(started.elapsed() >= SERVER_TIMEOUT);

        let generation = match event {
            Event::TimerExpired { timer: kind, generation } => {
                assert_eq!(kind, ChannelKind::Server);
                generation
            }
            other => panic!("unexpected event {:?}", other),
        };
        assert_eq!(timer.expire(generation), Some(Trigger::ServerTimerExpired));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_rejects_queued_expiry() {
        let (tx, mut rx) = event_queue();
        let mut timer = TimerHandle::new(ChannelKind::Serial, SERIAL_TIMEOUT, tx);
        timer.on_expire(server_expired);

        timer.arm(Duration::from_millis(10));
        let event = rx.recv().await.unwrap();

        // Completion won the race: the timer is stopped before the machine
        // looks at the expiry
        timer.disarm();
        if let Event::TimerExpired { generation, .. } = event {
            assert_eq!(timer.expire(generation), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_invalidates_previous_arming() {
        let (tx, mut rx) = event_queue();
        let mut timer = TimerHandle::new(ChannelKind::Serial, SERIAL_TIMEOUT, tx);
        timer.on_expire(server_expired);

        timer.arm(Duration::from_millis(10));
        let old = timer.generation();
        timer.arm(Duration::from_millis(20));

        assert_eq!(timer.expire(old), None);
        assert!(timer.is_armed());

        match rx.recv().await.unwrap() {
            Event::TimerExpired { generation, .. } => {
                assert_eq!(generation, timer.generation());
                assert!(timer.expire(generation).is_some());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disarm_is_idempotent() {
        let (tx, _rx) = event_queue();
        let mut pair = TimerPair::new(SERVER_TIMEOUT, SERIAL_TIMEOUT, tx);

        pair.disarm_all();
        let generation = pair.serial.generation();
        pair.serial.disarm();
        assert_eq!(pair.serial.generation(), generation);

        pair.server.start();
        assert_eq!(pair.armed_count(), 1);
        pair.disarm_all();
        pair.disarm_all();
        assert_eq!(pair.armed_count(), 0);
    }
}
