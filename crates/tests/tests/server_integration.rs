//! End-to-end tests: real WebSocket clients against a server on the soft mixer

use mixcast_core::domain::{MixerError, ScaledVolume, StateMessage};
use mixcast_infra::server::ServerError;
use mixcast_tests::{expect_silence, next_state, send_json, send_text, TestServer, TIMEOUT};
use serde_json::json;

fn volume(p: u8) -> StateMessage {
    StateMessage::Volume(ScaledVolume::new(p).unwrap())
}

// ============================================================================
// CONNECTION LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_greeting_sends_volume_then_mute() {
    let server = TestServer::start((0, 100_000), 79_370, true).await;
    let mut client = server.connect().await;

    assert_eq!(next_state(&mut client).await, volume(50));
    assert_eq!(next_state(&mut client).await, StateMessage::Mute(false));
    expect_silence(&mut client).await;
}

#[tokio::test]
async fn test_greeting_reports_muted_switch() {
    let server = TestServer::start((0, 100_000), 0, false).await;
    let mut client = server.connect().await;

    assert_eq!(next_state(&mut client).await, volume(0));
    assert_eq!(next_state(&mut client).await, StateMessage::Mute(true));
}

#[tokio::test]
async fn test_any_path_accepts_websocket() {
    let server = TestServer::start((0, 100), 100, true).await;
    let mut client = server.connect_path("/some/where").await;

    assert_eq!(next_state(&mut client).await, volume(100));
}

#[tokio::test]
async fn test_disconnect_removes_registration() {
    let server = TestServer::start((0, 100), 50, true).await;
    let mut a = server.connect_greeted().await;
    let b = server.connect_greeted().await;
    server.wait_for_clients(2).await;

    a.close(None).await.unwrap();
    server.wait_for_clients(1).await;

    drop(b);
    server.wait_for_clients(0).await;
}

// ============================================================================
// CLIENT COMMANDS
// ============================================================================

#[tokio::test]
async fn test_set_volume_reaches_every_client() {
    let server = TestServer::start((0, 100_000), 0, true).await;
    let mut sender = server.connect_greeted().await;
    let mut watcher = server.connect_greeted().await;

    send_json(&mut sender, json!({"type": "volume", "value": 50})).await;

    assert_eq!(next_state(&mut sender).await, volume(50));
    assert_eq!(next_state(&mut watcher).await, volume(50));
    assert_eq!(server.soft.volume_writes(), vec![79_370]);
    assert_eq!(server.soft.current_volume(), 79_370);
}

#[tokio::test]
async fn test_mute_toggle_broadcasts_new_state() {
    let server = TestServer::start((0, 100), 50, true).await;
    let mut sender = server.connect_greeted().await;
    let mut watcher = server.connect_greeted().await;

    send_json(&mut sender, json!({"type": "mute"})).await;

    assert_eq!(next_state(&mut sender).await, StateMessage::Mute(true));
    assert_eq!(next_state(&mut watcher).await, StateMessage::Mute(true));
    assert_eq!(server.soft.switch_writes(), vec![false]);

    // The value a client sends along is ignored, mute always toggles
    send_json(&mut watcher, json!({"type": "mute", "value": true})).await;

    assert_eq!(next_state(&mut sender).await, StateMessage::Mute(false));
    assert_eq!(next_state(&mut watcher).await, StateMessage::Mute(false));
    assert!(server.soft.current_switch());
}

#[tokio::test]
async fn test_unchanged_volume_is_not_rebroadcast() {
    let server = TestServer::start((0, 100), 100, true).await;
    let mut client = server.connect_greeted().await;

    send_json(&mut client, json!({"type": "volume", "value": 100})).await;

    expect_silence(&mut client).await;
    assert_eq!(server.soft.volume_writes(), vec![100]);
}

#[tokio::test]
async fn test_unknown_message_keeps_session_alive() {
    let server = TestServer::start((0, 100_000), 0, true).await;
    let mut client = server.connect_greeted().await;

    send_json(&mut client, json!({"type": "frobnicate"})).await;
    send_text(&mut client, "not json at all").await;
    send_json(&mut client, json!({"type": "volume", "value": 250})).await;
    expect_silence(&mut client).await;
    server.wait_for_clients(1).await;

    send_json(&mut client, json!({"type": "volume", "value": 50})).await;
    assert_eq!(next_state(&mut client).await, volume(50));
}

// ============================================================================
// HARDWARE CHANGES
// ============================================================================

#[tokio::test]
async fn test_knob_turn_is_broadcast() {
    let server = TestServer::start((0, 100_000), 0, true).await;
    let mut a = server.connect_greeted().await;
    let mut b = server.connect_greeted().await;

    server.soft.turn_knob(79_370);

    assert_eq!(next_state(&mut a).await, volume(50));
    assert_eq!(next_state(&mut b).await, volume(50));
}

#[tokio::test]
async fn test_switch_press_is_broadcast() {
    let server = TestServer::start((0, 100), 50, true).await;
    let mut client = server.connect_greeted().await;

    server.soft.press_switch(false);
    assert_eq!(next_state(&mut client).await, StateMessage::Mute(true));

    server.soft.press_switch(true);
    assert_eq!(next_state(&mut client).await, StateMessage::Mute(false));
}

#[tokio::test]
async fn test_event_source_failure_stops_server() {
    let mut server = TestServer::start((0, 100), 50, true).await;
    let _client = server.connect_greeted().await;

    server.soft.fail("card unplugged");

    let result = tokio::time::timeout(TIMEOUT, &mut server.task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        Err(ServerError::Mixer(MixerError::Device(reason))) if reason == "card unplugged"
    ));
}
