//! Mixer backends and the shared handle used by the server
//!
//! Backends:
//! - `alsa`: ALSA simple mixer control, behind the `alsa` cargo feature
//! - `soft`: in-memory mixer for tests and hardware-less runs

#[cfg(feature = "alsa")]
pub mod alsa_backend;
pub mod handle;
pub mod soft;

pub use handle::MixerHandle;
pub use soft::SoftMixer;

use mixcast_core::domain::{BackendKind, MixerConfig, MixerDevice, MixerError, VolumeRange};
use tracing::info;

/// Open the backend selected by `config`
pub fn open_device(config: &MixerConfig) -> Result<MixerDevice, MixerError> {
    match config.backend {
        BackendKind::Alsa => open_alsa(config),
        BackendKind::Soft => {
            let soft = &config.soft;
            let range = VolumeRange::new(soft.min, soft.max)?;
            info!(%range, volume = soft.volume, switch = soft.switch, "Using in-memory mixer");
            Ok(SoftMixer::new(range, soft.volume, soft.switch).device())
        }
    }
}

#[cfg(feature = "alsa")]
fn open_alsa(config: &MixerConfig) -> Result<MixerDevice, MixerError> {
    alsa_backend::open(&config.card, &config.device, &config.control)
}

#[cfg(not(feature = "alsa"))]
fn open_alsa(_config: &MixerConfig) -> Result<MixerDevice, MixerError> {
    Err(MixerError::Unavailable(
        "built without the `alsa` feature, use the soft backend or rebuild with --features alsa"
            .to_string(),
    ))
}
