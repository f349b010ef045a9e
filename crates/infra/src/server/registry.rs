//! Registry of connected clients
//!
//! Every open WebSocket session is registered here for as long as it lives.
//! Broadcasts snapshot the membership, send without holding the lock, and
//! drop any session whose send fails.

use async_trait::async_trait;
use futures_util::future::{join_all, BoxFuture};
use mixcast_core::domain::{MixerError, ProtocolError, StateMessage};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors delivering a message to one client
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Client connection closed")]
    Closed,

    #[error(transparent)]
    Encode(#[from] ProtocolError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),
}

/// Identifier of one connected session, unique for the server's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Errors greeting a new client
#[derive(Debug, Error)]
pub enum GreetError {
    #[error(transparent)]
    Mixer(#[from] MixerError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Deferred read of the state a new client is greeted with
pub type Snapshot<'a> = BoxFuture<'a, Result<[StateMessage; 2], MixerError>>;

/// Outbound half of a client connection
#[async_trait]
pub trait ClientSink: Send + Sync {
    async fn send(&self, message: &StateMessage) -> Result<(), TransportError>;

    /// Resolve `snapshot` and send its messages with no other send in between
    ///
    /// Sinks backed by a connection hold their write lock across the read, so
    /// a broadcast racing the greeting is delivered after it.
    async fn send_snapshot(&self, snapshot: Snapshot<'_>) -> Result<(), GreetError> {
        for message in snapshot.await? {
            self.send(&message).await?;
        }
        Ok(())
    }
}

struct Inner {
    clients: Mutex<HashMap<ClientId, Arc<dyn ClientSink>>>,
    next_id: AtomicU64,
}

/// Set of clients that receive state broadcasts
#[derive(Clone)]
pub struct ClientRegistry {
    inner: Arc<Inner>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                clients: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    // The map is never left half-updated, so poisoning is ignored
    fn clients(&self) -> MutexGuard<'_, HashMap<ClientId, Arc<dyn ClientSink>>> {
        self.inner
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a client and return its id
    pub fn add(&self, sink: Arc<dyn ClientSink>) -> ClientId {
        let id = ClientId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut clients = self.clients();
            clients.insert(id, sink);
            clients.len()
        };
        info!(client = %id, clients = count, "Client registered");
        id
    }

    /// Add a client for the lifetime of the returned guard
    pub fn register(&self, sink: Arc<dyn ClientSink>) -> Registration {
        let id = self.add(sink);
        Registration {
            registry: self.clone(),
            id,
        }
    }

    /// Remove a client; removing an absent id is a no-op
    pub fn remove(&self, id: ClientId) -> bool {
        let (removed, count) = {
            let mut clients = self.clients();
            let removed = clients.remove(&id).is_some();
            (removed, clients.len())
        };
        if removed {
            info!(client = %id, clients = count, "Client unregistered");
        }
        removed
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients().is_empty()
    }

    /// Send `message` to every registered client
    ///
    /// Clients whose send fails are unregistered. Returns the number of
    /// clients the message was delivered to.
    pub async fn broadcast(&self, message: &StateMessage) -> usize {
        let members: Vec<(ClientId, Arc<dyn ClientSink>)> = self
            .clients()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        if members.is_empty() {
            debug!(?message, "No clients to broadcast to");
            return 0;
        }

        let results = join_all(members.iter().map(|(id, sink)| async move {
            (*id, sink.send(message).await)
        }))
        .await;

        let mut delivered = 0;
        for (id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(client = %id, error = %e, "Dropping client after failed send");
                    self.remove(id);
                }
            }
        }

        debug!(?message, delivered, "Broadcast state");
        delivered
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.len())
            .finish()
    }
}

/// Scoped membership: the client is unregistered when this is dropped
#[derive(Debug)]
pub struct Registration {
    registry: ClientRegistry,
    id: ClientId,
}

impl Registration {
    pub fn id(&self) -> ClientId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Sink that records what it was sent, optionally failing every send
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub sent: Mutex<Vec<StateMessage>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn messages(&self) -> Vec<StateMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClientSink for RecordingSink {
        async fn send(&self, message: &StateMessage) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Closed);
            }
            self.sent.lock().unwrap().push(*message);
            Ok(())
        }
    }

    #[test]
    fn test_add_and_remove() {
        let registry = ClientRegistry::new();
        assert!(registry.is_empty());

        let a = registry.add(Arc::new(RecordingSink::default()));
        let b = registry.add(Arc::new(RecordingSink::default()));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(a));
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ClientRegistry::new();
        let id = registry.add(Arc::new(RecordingSink::default()));

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registration_guard_unregisters_on_drop() {
        let registry = ClientRegistry::new();
        let guard = registry.register(Arc::new(RecordingSink::default()));
        let id = guard.id();
        assert!(registry.contains(id));

        drop(guard);
        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_client_id_display() {
        let registry = ClientRegistry::new();
        let id = registry.add(Arc::new(RecordingSink::default()));
        assert_eq!(id.to_string(), "client-1");
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_client() {
        let registry = ClientRegistry::new();
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        registry.add(a.clone());
        registry.add(b.clone());

        let delivered = registry.broadcast(&StateMessage::Mute(true)).await;

        assert_eq!(delivered, 2);
        assert_eq!(a.messages(), vec![StateMessage::Mute(true)]);
        assert_eq!(b.messages(), vec![StateMessage::Mute(true)]);
    }

    #[tokio::test]
    async fn test_broadcast_to_nobody() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.broadcast(&StateMessage::Mute(false)).await, 0);
    }

    #[tokio::test]
    async fn test_failed_send_unregisters_only_that_client() {
        let registry = ClientRegistry::new();
        let healthy = Arc::new(RecordingSink::default());
        let healthy_id = registry.add(healthy.clone());
        let broken_id = registry.add(Arc::new(RecordingSink::failing()));

        let delivered = registry.broadcast(&StateMessage::Mute(false)).await;

        assert_eq!(delivered, 1);
        assert!(registry.contains(healthy_id));
        assert!(!registry.contains(broken_id));
        assert_eq!(healthy.messages(), vec![StateMessage::Mute(false)]);

        // The broken client is gone, later broadcasts only reach the healthy one
        assert_eq!(registry.broadcast(&StateMessage::Mute(true)).await, 1);
    }
}
