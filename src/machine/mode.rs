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

//! Operating modes and the pure transition function.

use std::fmt;

use crate::error::{ChannelKind, FailureKind};
use crate::protocol::{BeaconTimestamp, BeaconUuid, ContactResult};

/// Handshake progress of a beacon transfer. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransferStage {
    AwaitingTimestamp,
    AwaitingUuid,
    AwaitingRecords,
    Done,
}

/// Progress of a contact check or alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContactStage {
    /// Waiting for the websocket handshake.
    AwaitingServer,
    /// Server is up, waiting for the beacon to report its UUID.
    AwaitingUuid,
    /// Check sent, waiting for the server's verdict.
    AwaitingVerdict,
    /// Nothing left to wait for.
    Resolved,
}

/// What the machine is doing. Exactly one mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    ServerConnect,
    Transfer(TransferStage),
    CheckContact(ContactStage),
    AlertContact(ContactStage),
    ServerTimeout,
    SerialTimeout,
}

/// Everything that can move the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    RequestSync,
    RequestCheckContact,
    /// Confirmation is collected by the front end before this is raised.
    RequestAlertContact { confirmed: bool },
    ServerConnected,
    Timestamp(BeaconTimestamp),
    Uuid(BeaconUuid),
    /// A data line during the record dump.
    Record(String),
    Done,
    ContactReply(ContactResult),
    ServerTimerExpired,
    SerialTimerExpired,
    ChannelFailed {
        channel: ChannelKind,
        kind: FailureKind,
        message: String,
    },
    /// The timeout mode has reported and released everything.
    TimeoutReported,
    GoHome,
}

impl Mode {
    /// The mode reached by applying `trigger`, or `None` when the trigger
    /// means nothing in this mode and must be ignored.
    ///
    /// Pure: all side effects live in the machine's entry, exit and trigger
    /// actions.
    pub fn next(self, trigger: &Trigger) -> Option<Mode> {
        use ContactStage as C;
        use TransferStage as T;

        let next = match (self, trigger) {
            (Mode::Idle, Trigger::RequestSync) => Mode::ServerConnect,
            (Mode::Idle, Trigger::RequestCheckContact) => Mode::CheckContact(C::AwaitingServer),
            (Mode::Idle, Trigger::RequestAlertContact { confirmed: true }) => {
                Mode::AlertContact(C::AwaitingServer)
            }
            (Mode::Idle, Trigger::RequestAlertContact { confirmed: false }) => Mode::Idle,

            (Mode::ServerConnect, Trigger::ServerConnected) => {
                Mode::Transfer(T::AwaitingTimestamp)
            }
            (Mode::Transfer(T::AwaitingTimestamp), Trigger::Timestamp(_)) => {
                Mode::Transfer(T::AwaitingUuid)
            }
            (Mode::Transfer(T::AwaitingUuid), Trigger::Uuid(_)) => {
                Mode::Transfer(T::AwaitingRecords)
            }
            (Mode::Transfer(T::AwaitingRecords), Trigger::Record(_)) => self,
            (Mode::Transfer(T::AwaitingRecords), Trigger::Done) => Mode::Transfer(T::Done),

            (Mode::CheckContact(C::AwaitingServer), Trigger::ServerConnected) => {
                Mode::CheckContact(C::AwaitingUuid)
            }
            (Mode::CheckContact(C::AwaitingUuid), Trigger::Uuid(_)) => {
                Mode::CheckContact(C::AwaitingVerdict)
            }
            (Mode::CheckContact(C::AwaitingVerdict), Trigger::ContactReply(_)) => {
                Mode::CheckContact(C::Resolved)
            }

            (Mode::AlertContact(C::AwaitingServer), Trigger::ServerConnected) => {
                Mode::AlertContact(C::AwaitingUuid)
            }
            // Fire-and-forget: nothing is awaited after the alert is sent
            (Mode::AlertContact(C::AwaitingUuid), Trigger::Uuid(_)) => {
                Mode::AlertContact(C::Resolved)
            }

            (
                Mode::Transfer(T::Done)
                | Mode::CheckContact(C::Resolved)
                | Mode::AlertContact(C::Resolved),
                Trigger::GoHome,
            ) => Mode::Idle,

            (mode, Trigger::ServerTimerExpired) if mode.is_busy() => Mode::ServerTimeout,
            (mode, Trigger::SerialTimerExpired) if mode.is_busy() => Mode::SerialTimeout,
            (mode, Trigger::ChannelFailed { .. }) if mode.is_busy() => Mode::Idle,
            (Mode::ServerTimeout | Mode::SerialTimeout, Trigger::TimeoutReported) => Mode::Idle,

            _ => return None,
        };

        Some(next)
    }

    /// Whether an operation is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Mode::ServerConnect
                | Mode::Transfer(_)
                | Mode::CheckContact(_)
                | Mode::AlertContact(_)
        )
    }

    /// Whether `other` is the same top-level mode, ignoring stages.
    pub fn same_kind(&self, other: &Mode) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn transfer_stage(&self) -> Option<TransferStage> {
        match self {
            Mode::Transfer(stage) => Some(*stage),
            _ => None,
        }
    }

    /// Status text shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Idle => "Idle",
            Mode::ServerConnect => "Connecting to server...",
            Mode::Transfer(TransferStage::AwaitingTimestamp) => "Waiting for beacon handshake...",
            Mode::Transfer(TransferStage::AwaitingUuid) => "Reading beacon ID...",
            Mode::Transfer(TransferStage::AwaitingRecords) => "Uploading beacon records...",
            Mode::Transfer(TransferStage::Done) => "Transfer complete",
            Mode::CheckContact(_) => "Checking contact status...",
            Mode::AlertContact(_) => "Reporting exposure...",
            Mode::ServerTimeout => "Server timed out",
            Mode::SerialTimeout => "Beacon timed out",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Transfer(stage) => write!(f, "Transfer({:?})", stage),
            Mode::CheckContact(stage) => write!(f, "CheckContact({:?})", stage),
            Mode::AlertContact(stage) => write!(f, "AlertContact({:?})", stage),
            other => write!(f, "{:?}", other),
        }
    }
}
