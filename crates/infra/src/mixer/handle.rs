//! Async facade over the control half of a mixer
//!
//! Device calls block, so each one runs on tokio's blocking pool while
//! holding the single control lock. The lock guards get/set only: the event
//! half waits on its own thread and never touches it.

use mixcast_core::domain::{
    muted_from_switch, MixerControl, MixerError, NativeVolume, ScaledVolume, StateMessage,
    VolumeCurve, VolumeRange,
};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type Result<T> = std::result::Result<T, MixerError>;

/// Shared, serialized access to one mixer control
#[derive(Clone)]
pub struct MixerHandle {
    control: Arc<Mutex<Box<dyn MixerControl>>>,
    range: VolumeRange,
    curve: VolumeCurve,
}

impl MixerHandle {
    /// Wrap a control, reading its range once
    pub fn new(mut control: Box<dyn MixerControl>, curve: VolumeCurve) -> Result<Self> {
        let range = control.range()?;
        debug!(%range, ?curve, "Mixer handle ready");
        Ok(Self {
            control: Arc::new(Mutex::new(control)),
            range,
            curve,
        })
    }

    pub fn range(&self) -> VolumeRange {
        self.range
    }

    pub fn curve(&self) -> VolumeCurve {
        self.curve
    }

    /// Run `op` against the control on the blocking pool, under the lock
    async fn with_control<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn MixerControl) -> Result<T> + Send + 'static,
    {
        let control = Arc::clone(&self.control);
        tokio::task::spawn_blocking(move || {
            let mut guard = control.lock().map_err(|_| MixerError::Poisoned)?;
            op(&mut **guard)
        })
        .await
        .map_err(|e| MixerError::Device(format!("mixer call aborted: {e}")))?
    }

    pub async fn volume(&self) -> Result<NativeVolume> {
        self.with_control(|control| control.volume()).await
    }

    pub async fn set_volume(&self, volume: NativeVolume) -> Result<()> {
        self.with_control(move |control| control.set_volume(volume))
            .await
    }

    pub async fn switch(&self) -> Result<bool> {
        self.with_control(|control| control.switch()).await
    }

    pub async fn set_switch(&self, switch: bool) -> Result<()> {
        self.with_control(move |control| control.set_switch(switch))
            .await
    }

    /// Current volume as a client percentage
    pub async fn scaled_volume(&self) -> Result<ScaledVolume> {
        let native = self.volume().await?;
        Ok(self.curve.scale(native, self.range))
    }

    /// Set the volume from a client percentage, returning the native value written
    pub async fn set_scaled_volume(&self, volume: ScaledVolume) -> Result<NativeVolume> {
        let native = self.curve.unscale(volume, self.range);
        debug!(%volume, native, "Setting volume");
        self.set_volume(native).await?;
        Ok(native)
    }

    pub async fn muted(&self) -> Result<bool> {
        Ok(muted_from_switch(self.switch().await?))
    }

    /// Invert the switch in one locked read-modify-write, returning the new switch
    pub async fn toggle_mute(&self) -> Result<bool> {
        self.with_control(|control| {
            let switch = !control.switch()?;
            control.set_switch(switch)?;
            Ok(switch)
        })
        .await
    }

    /// Current state as the two messages a new client is greeted with
    pub async fn snapshot(&self) -> Result<[StateMessage; 2]> {
        let range = self.range;
        let curve = self.curve;
        let (native, switch) = self
            .with_control(|control| Ok((control.volume()?, control.switch()?)))
            .await?;
        Ok([
            StateMessage::Volume(curve.scale(native, range)),
            StateMessage::Mute(muted_from_switch(switch)),
        ])
    }
}

impl fmt::Debug for MixerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixerHandle")
            .field("range", &self.range)
            .field("curve", &self.curve)
            .finish_non_exhaustive()
    }
}
