//! WebSocket gateway
//!
//! Accepts connections, registers a `Client` per connection with the relay
//! and translates `join`/`leave` frames into relay calls. Each connection
//! has two halves: the receive loop below and a spawned send loop that
//! drains the client's channel into the socket. Whichever half finishes
//! first triggers the disconnect, exactly once.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::broker::Relay;
use crate::broker::engine::{encode, lock};
use crate::broker::topic::SubscriberId;
use crate::client::Client;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::RelayError;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub async fn start_websocket_server(
    addr: String,
    relay: Arc<Mutex<Relay>>,
    hostname: String,
) -> Result<(), RelayError> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!("WebSocket server listening on ws://{addr}");
    serve(listener, relay, hostname).await;
    Ok(())
}

/// Accept loop over an already-bound listener. Runs until the task is
/// dropped; accept errors are logged and retried.
pub async fn serve(listener: TcpListener, relay: Arc<Mutex<Relay>>, hostname: String) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                // EMFILE, ECONNABORTED and friends; the listener itself is fine
                warn!("Failed to accept connection: {e}");
                sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };
        debug!(%peer, "accepted connection");
        spawn(handle_connection(stream, relay.clone(), hostname.clone()));
    }
}

async fn handle_connection(stream: TcpStream, relay: Arc<Mutex<Relay>>, hostname: String) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    let client_id = client.id.clone();

    if let Some(text) = encode(&ServerMessage::Host { hostname }) {
        let _ = client.send_text(text);
    }
    lock(&relay).register_client(client);
    info!(client_id = %client_id, "client connected");

    let cleanup_called = Arc::new(AtomicBool::new(false));

    let do_cleanup = {
        let relay = relay.clone();
        let client_id = client_id.clone();
        let cleanup_called = cleanup_called.clone();

        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                lock(&relay).disconnect(&client_id);
            }
        }
    };

    {
        let client_id = client_id.clone();
        let do_cleanup = do_cleanup.clone();

        spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message to {client_id}: {e}");
                    break;
                }
            }

            do_cleanup();
            debug!("Send loop closed for {client_id}");
        });
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            WsMessage::Text(text) => handle_frame(&relay, &client_id, text.as_str()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    do_cleanup();
}

/// Applies one client text frame to the relay.
pub(crate) fn handle_frame(relay: &Mutex<Relay>, client_id: &SubscriberId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Join { query }) | Ok(ClientMessage::Leave { query })
            if query.is_empty() =>
        {
            reply_error(relay, client_id, "query must not be empty");
        }
        Ok(ClientMessage::Join { query }) => {
            lock(relay).join(&query, client_id.clone());
        }
        Ok(ClientMessage::Leave { query }) => {
            lock(relay).leave(&query, client_id);
        }
        Err(err) => {
            warn!(
                "Invalid client message from {client_id}: {err} | {}",
                text.chars().take(100).collect::<String>()
            );
            reply_error(relay, client_id, "invalid message");
        }
    }
}

fn reply_error(relay: &Mutex<Relay>, client_id: &SubscriberId, message: &str) {
    let Some(text) = encode(&ServerMessage::Error {
        message: message.to_string(),
    }) else {
        return;
    };
    if let Some(client) = lock(relay).client(client_id) {
        let _ = client.send_text(text);
    }
}
