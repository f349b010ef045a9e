//! Hardware change monitor
//!
//! Waiting for mixer events blocks, so it runs on a dedicated OS thread that
//! forwards each change set over a channel. The async side turns change sets
//! into state broadcasts. An error from the event source is fatal for the
//! whole server and is returned from the monitor task.

use crate::mixer::MixerHandle;
use crate::server::registry::ClientRegistry;
use mixcast_core::domain::{muted_from_switch, EventSet, MixerError, MixerEvents, StateMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const EVENT_QUEUE: usize = 32;

type EventResult = Result<EventSet, MixerError>;

/// Forwards hardware changes to every registered client
#[derive(Debug, Clone)]
pub struct MonitorLoop {
    handle: MixerHandle,
    registry: ClientRegistry,
}

impl MonitorLoop {
    pub fn new(handle: MixerHandle, registry: ClientRegistry) -> Self {
        Self { handle, registry }
    }

    /// Start the event thread and the broadcasting task
    ///
    /// The returned task only finishes on a fatal event source error.
    pub fn spawn(
        self,
        mut events: Box<dyn MixerEvents>,
    ) -> Result<JoinHandle<Result<(), MixerError>>, MixerError> {
        let (tx, rx) = mpsc::channel::<EventResult>(EVENT_QUEUE);

        std::thread::Builder::new()
            .name("mixer-events".to_string())
            .spawn(move || loop {
                let result = events.wait_for_event();
                let fatal = result.is_err();
                if tx.blocking_send(result).is_err() || fatal {
                    debug!("Mixer event thread exiting");
                    break;
                }
            })
            .map_err(|e| MixerError::Device(format!("cannot start event thread: {e}")))?;

        info!("Hardware monitor started");
        Ok(tokio::spawn(self.run(rx)))
    }

    async fn run(self, mut rx: mpsc::Receiver<EventResult>) -> Result<(), MixerError> {
        loop {
            match rx.recv().await {
                Some(Ok(changes)) => self.dispatch(changes).await?,
                Some(Err(e)) => {
                    error!(error = %e, "Mixer event source failed");
                    return Err(e);
                }
                None => {
                    error!("Mixer event thread went away");
                    return Err(MixerError::EventSourceClosed);
                }
            }
        }
    }

    /// Broadcast the state for one change set, volume before mute
    pub async fn dispatch(&self, changes: EventSet) -> Result<(), MixerError> {
        if changes.volume.is_some() {
            let volume = self.handle.scaled_volume().await?;
            debug!(%volume, "Hardware volume changed");
            self.registry.broadcast(&StateMessage::Volume(volume)).await;
        }
        if let Some(switch) = changes.switch {
            let muted = muted_from_switch(switch);
            debug!(muted, "Hardware switch changed");
            self.registry.broadcast(&StateMessage::Mute(muted)).await;
        }
        Ok(())
    }
}
