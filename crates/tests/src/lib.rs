//! Helpers for end-to-end tests
//!
//! Starts a real server on an ephemeral port, backed by the in-memory mixer,
//! and talks to it with a plain WebSocket client.

use futures_util::{SinkExt, StreamExt};
use mixcast_core::domain::{ServerConfig, StateMessage, VolumeCurve, VolumeRange};
use mixcast_infra::mixer::SoftMixer;
use mixcast_infra::server::{ClientRegistry, Server, ServerError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A running server and the knobs to drive it
pub struct TestServer {
    pub addr: SocketAddr,
    pub soft: SoftMixer,
    pub registry: ClientRegistry,
    pub task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Serve a soft mixer over `range` with the default cube curve
    pub async fn start(range: (i64, i64), volume: i64, switch: bool) -> Self {
        let range = VolumeRange::new(range.0, range.1).unwrap();
        let soft = SoftMixer::new(range, volume, switch);
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        let server = Server::bind(&config, soft.device(), VolumeCurve::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry().clone();
        let task = tokio::spawn(server.run());

        Self {
            addr,
            soft,
            registry,
            task,
        }
    }

    pub async fn connect(&self) -> Client {
        self.connect_path("/").await
    }

    pub async fn connect_path(&self, path: &str) -> Client {
        let url = format!("ws://{}{}", self.addr, path);
        let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        client
    }

    /// Connect and consume the two greeting messages
    pub async fn connect_greeted(&self) -> Client {
        let mut client = self.connect().await;
        next_state(&mut client).await;
        next_state(&mut client).await;
        client
    }

    /// Wait until exactly `count` clients are registered
    pub async fn wait_for_clients(&self, count: usize) {
        tokio::time::timeout(TIMEOUT, async {
            while self.registry.len() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {count} clients, registry has {}",
                self.registry.len()
            )
        });
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Next state message from the server, skipping control frames
pub async fn next_state(client: &mut Client) -> StateMessage {
    let text = tokio::time::timeout(TIMEOUT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a state message");

    StateMessage::decode(&text).unwrap()
}

/// Assert the server sends nothing for a short while
pub async fn expect_silence(client: &mut Client) {
    let received = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(received.is_err(), "unexpected message: {received:?}");
}

pub async fn send_json(client: &mut Client, value: serde_json::Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

pub async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::Text(text.to_string())).await.unwrap();
}
