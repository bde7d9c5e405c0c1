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

//! Beacon Sync library.
//!
//! Links a contact-tracing beacon on a serial port with its exposure server
//! over a websocket, and drives the sync, contact check and exposure alert
//! exchanges between them.

pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod machine;
pub mod protocol;
pub mod serial;
pub mod server;
pub mod state;
pub mod timer;
pub mod ui;
