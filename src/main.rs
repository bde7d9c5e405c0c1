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

//! Beacon Sync desktop application

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon_sync::config::Config;
use beacon_sync::events::event_queue;
use beacon_sync::machine::SyncMachine;
use beacon_sync::serial::SerialPortTransport;
use beacon_sync::server::WebSocketTransport;
use beacon_sync::state::AppState;
use beacon_sync::ui::{self, ChannelNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("beacon_sync=info".parse()?))
        .init();

    info!("Starting Beacon Sync v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded, server at {}", config.endpoint());

    let state = AppState::new();
    let (event_tx, event_rx) = event_queue();
    let (notify_tx, notify_rx) = tokio::sync::mpsc::unbounded_channel();

    let mut machine = SyncMachine::new(
        SerialPortTransport::new(config.serial.baud_rate),
        WebSocketTransport::new(),
        event_tx.clone(),
        Box::new(ChannelNotifier::new(notify_tx)),
        config.settings(),
    );
    machine.refresh_devices();

    let machine_task = tokio::spawn(machine.run(event_rx));

    info!("Ready.");

    if let Err(e) = ui::run_console(state, event_tx, notify_rx).await {
        error!("Console failed: {}", e);
    }

    machine_task.abort();
    info!("Beacon Sync stopped");
    Ok(())
}
