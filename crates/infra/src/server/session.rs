//! One client connection
//!
//! A session registers its outbound half with the registry, greets the
//! client with the current state, then applies incoming commands until the
//! client leaves. Commands produce no direct reply: the resulting hardware
//! change comes back through the monitor as a broadcast to every client.

use crate::mixer::MixerHandle;
use crate::server::registry::{ClientRegistry, ClientSink, GreetError, Snapshot, TransportError};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, Stream, StreamExt};
use futures_util::{FutureExt, Sink, SinkExt};
use mixcast_core::domain::{ClientCommand, MixerError, StateMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Outbound half of a WebSocket, one text frame per message
///
/// Writers are serialized by an async lock; a greeting holds it from the
/// state read until its last frame is written.
pub struct WsSink<S = SplitSink<WebSocket, Message>> {
    sink: Mutex<S>,
}

impl<S> WsSink<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

async fn write_frame<S>(sink: &mut S, message: &StateMessage) -> Result<(), TransportError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let text = message.encode()?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

#[async_trait]
impl<S> ClientSink for WsSink<S>
where
    S: Sink<Message, Error = axum::Error> + Send + Unpin,
{
    async fn send(&self, message: &StateMessage) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        write_frame(&mut *sink, message).await
    }

    async fn send_snapshot(&self, snapshot: Snapshot<'_>) -> Result<(), GreetError> {
        let mut sink = self.sink.lock().await;
        for message in snapshot.await? {
            write_frame(&mut *sink, &message).await?;
        }
        Ok(())
    }
}

/// Serves client connections against one mixer
#[derive(Debug, Clone)]
pub struct SessionHandler {
    handle: MixerHandle,
    registry: ClientRegistry,
}

impl SessionHandler {
    pub fn new(handle: MixerHandle, registry: ClientRegistry) -> Self {
        Self { handle, registry }
    }

    /// Serve an upgraded WebSocket until the client disconnects
    pub async fn run(self, socket: WebSocket, peer: SocketAddr) {
        let (sink, frames) = socket.split();
        self.serve(Arc::new(WsSink::new(sink)), frames, peer).await;
    }

    /// Register `sink`, greet it, then consume `frames` until the session ends
    ///
    /// The client is unregistered on every exit path.
    pub async fn serve<S>(&self, sink: Arc<dyn ClientSink>, mut frames: S, peer: SocketAddr)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let registration = self.registry.register(Arc::clone(&sink));
        let client = registration.id();
        info!(%client, %peer, "Client connected");

        if let Err(e) = self.greet(sink.as_ref()).await {
            warn!(%client, error = %e, "Could not greet client");
            return;
        }

        while let Some(frame) = frames.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.handle_text(&text).await {
                        error!(%client, error = %e, "Mixer command failed, closing session");
                        break;
                    }
                }
                Ok(Message::Binary(data)) => {
                    warn!(%client, bytes = data.len(), "Ignoring binary frame");
                }
                Ok(Message::Close(_)) => {
                    debug!(%client, "Client sent close");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(%client, error = %e, "Connection error");
                    break;
                }
            }
        }

        info!(%client, %peer, "Client disconnected");
    }

    /// Send the current volume, then the current mute state
    ///
    /// The state is read only once the sink is held, so the greeting never
    /// lands after a newer broadcast.
    pub async fn greet(&self, sink: &dyn ClientSink) -> Result<(), GreetError> {
        sink.send_snapshot(self.handle.snapshot().boxed()).await
    }

    /// Apply one text frame from a client
    ///
    /// Unrecognized messages are logged and ignored. A device error is
    /// returned and ends the session.
    pub async fn handle_text(&self, text: &str) -> Result<(), MixerError> {
        let command = match ClientCommand::decode(text) {
            Ok(command) => command,
            Err(e) => {
                warn!(frame = text, error = %e, "Ignoring client message");
                return Ok(());
            }
        };

        match command {
            ClientCommand::SetVolume { value } => {
                let native = self.handle.set_scaled_volume(value).await?;
                debug!(%value, native, "Client set volume");
            }
            ClientCommand::ToggleMute => {
                let switch = self.handle.toggle_mute().await?;
                debug!(switch, "Client toggled mute");
            }
        }
        Ok(())
    }
}
