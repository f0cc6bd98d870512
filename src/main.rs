//! Cache replay entry point.
//!
//! Reads newline-delimited gateway payloads (as captured off the WebSocket)
//! from a file or stdin, feeds them through the cache in order and logs
//! every resulting cache event. Useful to check how a recorded session
//! lands in the cache without connecting to Discord.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};

use tracing::{error, info, warn};

use discord_cache::{
    cache::Registry,
    config::ReplayConfig,
    dispatch::{self, CacheEvent},
    events::{GatewayEvent, GatewayPayload},
    types::{Channel, Guild, User},
};

// ---------------------------------------------------------------------------
// Event logging
// ---------------------------------------------------------------------------

fn log_event(event: &CacheEvent) {
    match event {
        CacheEvent::Ready { user } => {
            info!(user = %user.borrow().full_name(), "ready");
        }
        CacheEvent::Create(entity) => {
            info!(entity = %entity, "created");
        }
        CacheEvent::Update(entity, changes) => {
            let changed: Vec<&str> = changes.names().collect();
            info!(entity = %entity, changed = ?changed, "updated");
        }
        CacheEvent::Delete(entity) => {
            info!(entity = %entity, "deleted");
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    // Initialise tracing (respects RUST_LOG env, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match ReplayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let reader: Box<dyn BufRead> = match &config.input {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open replay input");
                std::process::exit(1);
            }
        },
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut registry = match config.current_user {
        Some(user_id) => Registry::with_current_user(user_id),
        None => Registry::new(),
    };

    let mut applied = 0_usize;
    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to read replay input");
                std::process::exit(1);
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let payload = match serde_json::from_str::<GatewayPayload>(&line) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(line = index + 1, error = %e, "failed to parse gateway payload");
                continue;
            }
        };

        let event = GatewayEvent::from_payload(payload);
        for cache_event in dispatch::apply(&mut registry, event) {
            log_event(&cache_event);
        }
        applied += 1;
    }

    info!(
        payloads = applied,
        users = registry.len::<User>(),
        guilds = registry.len::<Guild>(),
        channels = registry.len::<Channel>(),
        private_channels = registry.private_channels().len(),
        "replay finished"
    );
}
