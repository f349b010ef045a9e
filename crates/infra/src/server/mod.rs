//! WebSocket server
//!
//! Ties the pieces together: one [`MixerHandle`] and one [`ClientRegistry`]
//! shared by the hardware monitor and a session task per connection.
//! WebSocket upgrades are accepted on any path.

pub mod monitor;
pub mod registry;
pub mod session;

pub use monitor::MonitorLoop;
pub use registry::{
    ClientId, ClientRegistry, ClientSink, GreetError, Registration, Snapshot, TransportError,
};
pub use session::{SessionHandler, WsSink};

use crate::mixer::MixerHandle;
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use axum::Router;
use mixcast_core::domain::{MixerDevice, MixerError, MixerEvents, ServerConfig, VolumeCurve};
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Errors that stop the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Server I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Mixer(#[from] MixerError),

    #[error("Hardware monitor stopped")]
    MonitorStopped,

    #[error("Hardware monitor panicked: {0}")]
    MonitorPanicked(String),
}

/// A bound server, ready to run
pub struct Server {
    listener: TcpListener,
    handle: MixerHandle,
    events: Box<dyn MixerEvents>,
    registry: ClientRegistry,
}

impl Server {
    /// Wrap the device and bind the listener on `host:port`
    pub async fn bind(
        config: &ServerConfig,
        device: MixerDevice,
        curve: VolumeCurve,
    ) -> Result<Self, ServerError> {
        let MixerDevice { control, events } = device;
        let handle = MixerHandle::new(control, curve)?;

        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: format!("{}:{}", config.host, config.port),
                source,
            })?;

        Ok(Self {
            listener,
            handle,
            events,
            registry: ClientRegistry::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn handle(&self) -> &MixerHandle {
        &self.handle
    }

    /// Start the hardware monitor and serve clients
    ///
    /// Only returns when the listener fails or the monitor stops.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.local_addr()?;
        info!(
            range = %self.handle.range(),
            curve = ?self.handle.curve().method(),
            "Mixer ready"
        );
        let monitor = MonitorLoop::new(self.handle.clone(), self.registry.clone())
            .spawn(self.events)?;

        let sessions = SessionHandler::new(self.handle, self.registry);
        let app = Router::new().fallback(upgrade).with_state(sessions);

        info!(%addr, "Listening for WebSocket clients");
        let serve = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .into_future();

        tokio::select! {
            result = serve => {
                result?;
                Ok(())
            }
            joined = monitor => {
                match joined {
                    Ok(Ok(())) => Err(ServerError::MonitorStopped),
                    Ok(Err(e)) => {
                        error!(error = %e, "Hardware monitor failed");
                        Err(ServerError::Mixer(e))
                    }
                    Err(e) => Err(ServerError::MonitorPanicked(e.to_string())),
                }
            }
        }
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(sessions): State<SessionHandler>,
) -> Response {
    ws.on_upgrade(move |socket| sessions.run(socket, peer))
}
