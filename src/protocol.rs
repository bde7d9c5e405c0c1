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

//! Beacon and server wire vocabulary.
//!
//! The beacon speaks newline-delimited ASCII over serial. Incoming lines are
//! classified by marker substring, not by prefix, so `"> ts:100"` still counts
//! as a timestamp line.

use std::fmt;

/// Command asking the beacon to dump its handshake and records.
pub const SYNC_COMMAND: &str = "sync";

/// Command asking the beacon for its UUID only.
pub const UUID_COMMAND: &str = "uuid";

/// Marker of the timestamp handshake line.
pub const TIMESTAMP_MARKER: &str = "ts:";

/// Marker of the UUID line.
pub const UUID_MARKER: &str = "uuid:";

/// Marker of the end-of-transfer line.
pub const DONE_MARKER: &str = "done";

/// Frame telling the server the record dump is complete.
pub const DONE_FRAME: &str = "done\n";

/// Prefix of the contact check request.
pub const CHECK_PREFIX: &str = "chk:";

/// Prefix of the exposure alert.
pub const ALERT_PREFIX: &str = "uhoh:";

/// Server reply meaning a contact was found.
pub const REPLY_POSITIVE: &str = "y";

/// Server reply meaning no contact was found.
pub const REPLY_NEGATIVE: &str = "n";

/// Timestamp reported by the beacon during the sync handshake.
pub type BeaconTimestamp = i64;

/// Opaque identifier of the beacon, forwarded to the server verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconUuid(String);

impl BeaconUuid {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BeaconUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a contact check as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactResult {
    Positive,
    Negative,
    ServerError,
}

impl ContactResult {
    /// Classify a server reply frame.
    pub fn from_reply(frame: &str) -> Self {
        match frame.trim() {
            REPLY_POSITIVE => ContactResult::Positive,
            REPLY_NEGATIVE => ContactResult::Negative,
            _ => ContactResult::ServerError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactResult::Positive => "contact: positive",
            ContactResult::Negative => "contact: negative",
            ContactResult::ServerError => "contact: server-error",
        }
    }
}

impl fmt::Display for ContactResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the trailing integer of a `ts:` line.
pub fn parse_timestamp(line: &str) -> Option<BeaconTimestamp> {
    let start = line.find(TIMESTAMP_MARKER)? + TIMESTAMP_MARKER.len();
    line[start..].trim().parse().ok()
}

/// Extract the token following `uuid:`.
pub fn parse_uuid(line: &str) -> Option<BeaconUuid> {
    let start = line.find(UUID_MARKER)? + UUID_MARKER.len();
    let token = line[start..].trim();
    if token.is_empty() {
        None
    } else {
        Some(BeaconUuid::new(token))
    }
}

/// Whether the line ends the record dump.
pub fn is_done(line: &str) -> bool {
    line.contains(DONE_MARKER)
}

/// Frame carrying a raw record line to the server.
pub fn record_frame(line: &str) -> String {
    format!("{}\n", line)
}

/// Contact check request for a beacon.
pub fn check_frame(uuid: &BeaconUuid) -> String {
    format!("{}{}", CHECK_PREFIX, uuid)
}

/// Exposure alert for a beacon.
pub fn alert_frame(uuid: &BeaconUuid) -> String {
    format!("{}{}", ALERT_PREFIX, uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("ts:100"), Some(100));
        assert_eq!(parse_timestamp("ts: 1700000000 "), Some(1_700_000_000));
        assert_eq!(parse_timestamp("boot ts:-5"), Some(-5));
        assert_eq!(parse_timestamp("ts:soon"), None);
        assert_eq!(parse_timestamp("uuid:ABC"), None);
    }

    #[test]
    fn test_parse_uuid() {
        assert_eq!(parse_uuid("uuid:ABC"), Some(BeaconUuid::new("ABC")));
        assert_eq!(parse_uuid("id uuid: 9f2c-11 "), Some(BeaconUuid::new("9f2c-11")));
        assert_eq!(parse_uuid("uuid:"), None);
        assert_eq!(parse_uuid("ts:100"), None);
    }

    #[test]
    fn test_done_uses_containment() {
        assert!(is_done("done"));
        assert!(is_done("transfer done"));
        assert!(!is_done("rssi:-60"));
    }

    #[test]
    fn test_contact_reply() {
        assert_eq!(ContactResult::from_reply("y"), ContactResult::Positive);
        assert_eq!(ContactResult::from_reply("n\n"), ContactResult::Negative);
        assert_eq!(ContactResult::from_reply("yes"), ContactResult::ServerError);
        assert_eq!(ContactResult::from_reply(""), ContactResult::ServerError);
    }

    #[test]
    fn test_server_frames() {
        let uuid = BeaconUuid::new("ABC");
        assert_eq!(record_frame("rssi:-60"), "rssi:-60\n");
        assert_eq!(check_frame(&uuid), "chk:ABC");
        assert_eq!(alert_frame(&uuid), "uhoh:ABC");
    }
}
