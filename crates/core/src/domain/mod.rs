//! Domain entities and business rules

pub mod config;
pub mod curve;
pub mod mixer;
pub mod protocol;

pub use config::{AppConfig, BackendKind, ConfigError, MixerConfig, ServerConfig, SoftMixerConfig};
pub use curve::{CurveError, CurveMethod, VolumeCurve};
pub use mixer::{
    muted_from_switch, EventSet, MixerControl, MixerDevice, MixerError, MixerEvents, NativeVolume,
    OutOfRange, ScaledVolume, VolumeRange,
};
pub use protocol::{ClientCommand, ProtocolError, StateMessage};
