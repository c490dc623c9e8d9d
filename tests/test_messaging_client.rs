//! Messaging client behavior against a scripted transport
//!
//! Covers subscriber ordering, removal, isolation of failing handlers,
//! malformed frames, and the send/disconnect contracts.

use mystery_link::client::{handler, ConnectionState, ReconnectPolicy};
use mystery_link::protocol::{message_types, ChatMessage, Envelope};
use mystery_link::testing::{MockConnector, MockPeers};
use mystery_link::transport::OutboundFrame;
use mystery_link::{ClientError, HandlerError, MessagingClient};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

const ADDRESS: &str = "ws://mock.test/ws?gameId=1";

async fn connected_client() -> (MessagingClient, MockConnector, MockPeers) {
    let (connector, peers) = MockConnector::new();
    let mut client =
        MessagingClient::with_connector(ReconnectPolicy::default(), Arc::new(connector.clone()));
    client.connect(ADDRESS).await.unwrap();
    (client, connector, peers)
}

/// Handler that forwards a tag and the received data to the test
fn tagged(
    tag: &'static str,
    tx: &mpsc::UnboundedSender<(&'static str, Value)>,
) -> mystery_link::Handler {
    let tx = tx.clone();
    handler(move |data| {
        let _ = tx.send((tag, data.clone()));
        Ok(())
    })
}

#[tokio::test]
async fn test_handlers_invoked_in_registration_order() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let peer = peers.next().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    client.on(message_types::CHAT, tagged("h1", &tx)).unwrap();
    client.on(message_types::CHAT, tagged("h2", &tx)).unwrap();

    peer.push_envelope(&Envelope::raw(message_types::CHAT, json!({"content": "hi"})));

    assert_eq!(rx.recv().await.unwrap().0, "h1");
    assert_eq!(rx.recv().await.unwrap().0, "h2");
    client.disconnect().await;
}

#[tokio::test]
async fn test_two_chat_handlers_each_called_once_with_decoded_data() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let peer = peers.next().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    client.on(message_types::CHAT, tagged("a", &tx)).unwrap();
    client.on(message_types::CHAT, tagged("b", &tx)).unwrap();
    client.on("ping", tagged("done", &done_tx)).unwrap();

    let data = json!({"sender": "Player2", "content": "I found the knife", "gameId": "1"});
    peer.push_text(&json!({"type": "chat", "data": data}).to_string());
    peer.push_envelope(&Envelope::raw("ping", Value::Null));

    // The ping is dispatched after the chat, so every chat call has happened by now
    done_rx.recv().await.unwrap();

    let mut calls = Vec::new();
    while let Ok(call) = rx.try_recv() {
        calls.push(call);
    }
    assert_eq!(calls, vec![("a", data.clone()), ("b", data)]);
    client.disconnect().await;
}

#[tokio::test]
async fn test_removed_handler_is_never_invoked() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let peer = peers.next().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let removed = tagged("removed", &tx);
    client.on(message_types::CHAT, Arc::clone(&removed)).unwrap();
    client.on(message_types::CHAT, tagged("kept", &tx)).unwrap();

    assert!(client.off(message_types::CHAT, &removed));
    assert!(!client.off(message_types::CHAT, &removed));

    peer.push_envelope(&Envelope::raw(message_types::CHAT, json!({})));
    peer.push_envelope(&Envelope::raw(message_types::CHAT, json!({})));

    assert_eq!(rx.recv().await.unwrap().0, "kept");
    assert_eq!(rx.recv().await.unwrap().0, "kept");
    assert!(rx.try_recv().is_err());
    client.disconnect().await;
}

#[tokio::test]
async fn test_message_without_handlers_is_dropped() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let peer = peers.next().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .on(message_types::GAME_STATUS_UPDATE, tagged("status", &tx))
        .unwrap();

    peer.push_envelope(&Envelope::raw(message_types::PLAYER_UPDATE, json!({"players": []})));
    peer.push_envelope(&Envelope::raw(
        message_types::GAME_STATUS_UPDATE,
        json!({"status": "playing"}),
    ));

    let (tag, data) = rx.recv().await.unwrap();
    assert_eq!(tag, "status");
    assert_eq!(data["status"], "playing");
    assert!(client.is_connected());
    client.disconnect().await;
}

#[tokio::test]
async fn test_malformed_frames_are_dropped_and_client_keeps_running() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let peer = peers.next().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on(message_types::CHAT, tagged("chat", &tx)).unwrap();

    peer.push_text("not json at all");
    peer.push_text(r#"{"data": {"content": "no type"}}"#);
    peer.push_text(r#"["chat", {}]"#);
    peer.push_envelope(&Envelope::raw(message_types::CHAT, json!({"content": "ok"})));

    let (_, data) = rx.recv().await.unwrap();
    assert_eq!(data["content"], "ok");
    assert!(rx.try_recv().is_err());
    assert_eq!(client.connection_state(), ConnectionState::Open);
    client.disconnect().await;
}

#[tokio::test]
async fn test_failing_handlers_do_not_stop_others() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let peer = peers.next().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    client
        .on(
            message_types::CHAT,
            handler(|_| Err(HandlerError::failed("cannot render"))),
        )
        .unwrap();
    client
        .on(message_types::CHAT, handler(|_| panic!("handler bug")))
        .unwrap();
    client.on(message_types::CHAT, tagged("survivor", &tx)).unwrap();

    peer.push_envelope(&Envelope::raw(message_types::CHAT, json!({"n": 1})));
    peer.push_envelope(&Envelope::raw(message_types::CHAT, json!({"n": 2})));

    assert_eq!(rx.recv().await.unwrap().1["n"], 1);
    assert_eq!(rx.recv().await.unwrap().1["n"], 2);
    assert!(client.is_connected());
    client.disconnect().await;
}

#[tokio::test]
async fn test_typed_handler_decodes_payload() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let peer = peers.next().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let typed = client
        .on_typed(message_types::CHAT, move |chat: ChatMessage| {
            let _ = tx.send(chat);
            Ok(())
        })
        .unwrap();

    // Wrong shape is a handler failure, not a crash
    peer.push_envelope(&Envelope::raw(message_types::CHAT, json!({"text": "bad"})));
    peer.push_envelope(&Envelope::raw(
        message_types::CHAT,
        json!({"sender": "Admin", "content": "Welcome", "gameId": "1"}),
    ));

    let chat = rx.recv().await.unwrap();
    assert_eq!(chat.sender, "Admin");
    assert_eq!(chat.game_id.as_deref(), Some("1"));

    assert!(client.off(message_types::CHAT, &typed));
    assert_eq!(client.handler_count(message_types::CHAT), 0);
    client.disconnect().await;
}

#[tokio::test]
async fn test_send_while_never_connected_reports_error() {
    let (connector, _peers) = MockConnector::new();
    let client = MessagingClient::with_connector(ReconnectPolicy::default(), Arc::new(connector));

    let result = client.emit(message_types::CHAT, &json!({"content": "lost"}));

    assert!(matches!(
        result,
        Err(ClientError::NotConnected {
            state: ConnectionState::Idle
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_send_while_reconnecting_is_discarded() {
    let (mut client, connector, mut peers) = connected_client().await;
    let mut peer = peers.next().await.unwrap();
    connector.refuse_all("server down");

    peer.close(1006, "abnormal closure");
    client
        .wait_for(|state| matches!(state, ConnectionState::Reconnecting(_)))
        .await;

    let result = client.emit(message_types::CHAT, &json!({"content": "lost"}));
    assert!(matches!(
        result,
        Err(ClientError::NotConnected {
            state: ConnectionState::Reconnecting(1)
        })
    ));
    assert!(peer.drain_sent().is_empty());
    client.disconnect().await;
}

#[tokio::test]
async fn test_send_transmits_wire_form() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let mut peer = peers.next().await.unwrap();

    client
        .send(&Envelope::raw(message_types::GAME_STATUS_UPDATE, json!({"status": "playing"})))
        .unwrap();
    client
        .emit(
            message_types::CHAT,
            &ChatMessage {
                sender: "Admin".to_string(),
                content: "Let's begin".to_string(),
                game_id: Some("1".to_string()),
            },
        )
        .unwrap();

    let first: Value = serde_json::from_str(&peer.next_sent().await.unwrap()).unwrap();
    assert_eq!(first, json!({"type": "gameStatusUpdate", "data": {"status": "playing"}}));

    let second = Envelope::parse(&peer.next_sent().await.unwrap()).unwrap();
    assert_eq!(second.message_type, "chat");
    assert_eq!(second.data["gameId"], "1");
    client.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_closes_transport_and_clears_handlers() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let mut peer = peers.next().await.unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    client.on(message_types::CHAT, tagged("old", &tx)).unwrap();
    client.on(message_types::PLAYER_UPDATE, tagged("old", &tx)).unwrap();

    client.disconnect().await;

    assert!(peer.wait_closed().await);
    assert_eq!(client.handler_count(message_types::CHAT), 0);
    assert_eq!(client.handler_count(message_types::PLAYER_UPDATE), 0);
    assert_eq!(
        client.connection_state(),
        ConnectionState::Closed("client disconnected".to_string())
    );
    assert!(client.connected_since().is_none());
}

#[tokio::test]
async fn test_only_handlers_registered_after_disconnect_run() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let _first = peers.next().await.unwrap();
    let (old_tx, mut old_rx) = mpsc::unbounded_channel();
    let (new_tx, mut new_rx) = mpsc::unbounded_channel();

    client.on(message_types::CHAT, tagged("old", &old_tx)).unwrap();
    client.disconnect().await;

    client.connect(ADDRESS).await.unwrap();
    let second = peers.next().await.unwrap();
    client.on(message_types::CHAT, tagged("new", &new_tx)).unwrap();

    second.push_envelope(&Envelope::raw(message_types::CHAT, json!({})));

    assert_eq!(new_rx.recv().await.unwrap().0, "new");
    assert!(old_rx.try_recv().is_err());
    client.disconnect().await;
}

#[tokio::test]
async fn test_state_receiver_observes_open_and_close() {
    let (connector, mut peers) = MockConnector::new();
    let mut client =
        MessagingClient::with_connector(ReconnectPolicy::default(), Arc::new(connector));
    let mut state_rx = client.state_receiver();
    assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Idle);

    client.connect(ADDRESS).await.unwrap();
    assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Open);
    let _peer = peers.next().await.unwrap();

    client.disconnect().await;
    assert!(state_rx.has_changed().unwrap());
    assert!(matches!(
        *state_rx.borrow_and_update(),
        ConnectionState::Closed(_)
    ));
}

#[tokio::test]
async fn test_disconnect_without_connect_is_harmless() {
    let (connector, _peers) = MockConnector::new();
    let mut client =
        MessagingClient::with_connector(ReconnectPolicy::default(), Arc::new(connector));
    client.on(message_types::CHAT, handler(|_| Ok(()))).unwrap();

    client.disconnect().await;

    assert_eq!(client.handler_count(message_types::CHAT), 0);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_close_frame_sent_once_on_disconnect() {
    let (mut client, _connector, mut peers) = connected_client().await;
    let mut peer = peers.next().await.unwrap();

    client.emit(message_types::CHAT, &json!({"content": "bye"})).unwrap();
    client.disconnect().await;

    let frames = peer.drain_sent();
    assert_eq!(frames.len(), 2);
    assert!(matches!(frames[0], OutboundFrame::Text(_)));
    assert_eq!(frames[1], OutboundFrame::Close);
}
