use super::pubsub_client::{Client, ClientGone};
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

#[test]
fn test_client_new() {
    let (tx, _) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    assert!(client.id.starts_with("client-"));
}

#[test]
fn client_ids_are_unique() {
    let (tx, _) = mpsc::unbounded_channel::<WsMessage>();
    let a = Client::new(tx.clone());
    let b = Client::new(tx);
    assert_ne!(a.id, b.id);
}

#[test]
fn send_text_queues_a_text_frame() {
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    client.send_text("hello").unwrap();

    match rx.try_recv().unwrap() {
        WsMessage::Text(text) => assert_eq!(text.as_str(), "hello"),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

#[test]
fn send_text_fails_once_receiver_is_dropped() {
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Client::new(tx);
    drop(rx);
    assert_eq!(client.send_text("hello"), Err(ClientGone));
}
