//! CLI for streamrelay
//!
//! Subcommands:
//! - `server`: run the WebSocket gateway and the HTTP API
//! - `search <term>`: run one upstream search and print the results as JSON

use std::sync::{Arc, Mutex};

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};

use streamrelay::broker::Relay;
use streamrelay::config::{Settings, load_config};
use streamrelay::transport::http::{AppState, start_http_server};
use streamrelay::transport::websocket::start_websocket_server;
use streamrelay::upstream::{TwitterUpstream, Upstream, search_once};
use streamrelay::utils::error::RelayError;
use streamrelay::utils::logging;

#[derive(Parser)]
#[command(name = "streamrelay")]
enum Command {
    /// Start the WebSocket gateway and the HTTP API
    Server,
    /// Run a one-shot search and print the results
    Search {
        /// Search term
        term: String,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.log.level);

    let result = match cmd {
        Command::Server => run_server(config).await,
        Command::Search { term } => run_search(config, &term).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server(config: Settings) -> Result<(), RelayError> {
    let upstream: Arc<dyn Upstream> = Arc::new(TwitterUpstream::from_settings(&config.upstream)?);
    let (signals_tx, signals_rx) = mpsc::unbounded_channel();
    let relay = Arc::new(Mutex::new(Relay::new(upstream.clone(), signals_tx)));

    tokio::spawn(Relay::start_signal_loop(relay.clone(), signals_rx));

    let state = AppState {
        relay: relay.clone(),
        upstream,
        search_limit: config.upstream.search_limit,
    };

    tokio::select! {
        result = start_websocket_server(config.ws_addr(), relay, config.server.hostname.clone()) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        result = start_http_server(config.http_addr(), state) => {
            result?;
            error!("HTTP server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_search(config: Settings, term: &str) -> Result<(), RelayError> {
    let upstream = TwitterUpstream::from_settings(&config.upstream)?;
    let items = search_once(&upstream, term, config.upstream.search_limit).await;
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}
