//! Mixer control model and the device seam
//!
//! This module defines the value types shared by every layer (native and
//! scaled volume, the native range, hardware change events) and the two
//! traits a mixer backend implements. Implementations for real hardware and
//! for the in-memory mixer live in the `infra` crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by a mixer backend
#[derive(Debug, Error)]
pub enum MixerError {
    /// The card, device or control handle could not be opened
    #[error("Cannot open {what} {name}: {reason}")]
    Open {
        what: &'static str,
        name: String,
        reason: String,
    },

    /// The named simple control does not exist on the device
    #[error("Cannot find mixer control {0}")]
    ControlNotFound(String),

    /// The device reported a range with min >= max
    #[error("Invalid volume range: min {min} must be below max {max}")]
    InvalidRange { min: NativeVolume, max: NativeVolume },

    /// A get/set/wait call failed at the OS level
    #[error("Device error: {0}")]
    Device(String),

    /// The thread waiting for hardware events went away
    #[error("Hardware event source closed")]
    EventSourceClosed,

    /// A thread panicked while holding the device lock
    #[error("Mixer lock poisoned")]
    Poisoned,

    /// The requested backend was not compiled in
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, MixerError>;

/// Device-native volume value
pub type NativeVolume = i64;

/// Native volume bounds of a mixer control, `min < max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RangeBounds", into = "RangeBounds")]
pub struct VolumeRange {
    min: NativeVolume,
    max: NativeVolume,
}

/// Unchecked serialized form of [`VolumeRange`]
#[derive(Serialize, Deserialize)]
struct RangeBounds {
    min: NativeVolume,
    max: NativeVolume,
}

impl TryFrom<RangeBounds> for VolumeRange {
    type Error = MixerError;

    fn try_from(bounds: RangeBounds) -> Result<Self> {
        Self::new(bounds.min, bounds.max)
    }
}

impl From<VolumeRange> for RangeBounds {
    fn from(range: VolumeRange) -> Self {
        Self {
            min: range.min,
            max: range.max,
        }
    }
}

impl VolumeRange {
    pub fn new(min: NativeVolume, max: NativeVolume) -> Result<Self> {
        if min >= max {
            return Err(MixerError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> NativeVolume {
        self.min
    }

    pub fn max(&self) -> NativeVolume {
        self.max
    }

    /// Width of the range, always positive
    pub fn span(&self) -> NativeVolume {
        self.max - self.min
    }

    pub fn contains(&self, volume: NativeVolume) -> bool {
        (self.min..=self.max).contains(&volume)
    }

    pub fn clamp(&self, volume: NativeVolume) -> NativeVolume {
        volume.clamp(self.min, self.max)
    }
}

impl fmt::Display for VolumeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Client-facing volume percentage in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ScaledVolume(u8);

impl ScaledVolume {
    pub const MIN: ScaledVolume = ScaledVolume(0);
    pub const MAX: ScaledVolume = ScaledVolume(100);

    pub fn new(percent: u8) -> std::result::Result<Self, OutOfRange> {
        Self::try_from(i64::from(percent))
    }

    pub fn percent(&self) -> u8 {
        self.0
    }
}

/// Percentage outside `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("volume {0} is outside 0-100")]
pub struct OutOfRange(pub i64);

impl TryFrom<i64> for ScaledVolume {
    type Error = OutOfRange;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(percent) if percent <= 100 => Ok(Self(percent)),
            _ => Err(OutOfRange(value)),
        }
    }
}

impl From<ScaledVolume> for u8 {
    fn from(volume: ScaledVolume) -> Self {
        volume.0
    }
}

impl fmt::Display for ScaledVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Mute state seen by clients is the negation of the hardware switch
pub fn muted_from_switch(switch: bool) -> bool {
    !switch
}

/// Controls that changed in one hardware event, with their new raw values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSet {
    pub volume: Option<NativeVolume>,
    pub switch: Option<bool>,
}

impl EventSet {
    pub fn volume(volume: NativeVolume) -> Self {
        Self {
            volume: Some(volume),
            switch: None,
        }
    }

    pub fn switch(switch: bool) -> Self {
        Self {
            volume: None,
            switch: Some(switch),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.volume.is_none() && self.switch.is_none()
    }

    /// Fold a later event into this one, later values win
    pub fn merge(&mut self, later: EventSet) {
        if later.volume.is_some() {
            self.volume = later.volume;
        }
        if later.switch.is_some() {
            self.switch = later.switch;
        }
    }

    /// Take the pending changes, leaving an empty set behind
    pub fn take(&mut self) -> EventSet {
        std::mem::take(self)
    }
}

/// Get/set half of a mixer backend
///
/// Calls may block on device I/O. Callers serialize access to one instance.
pub trait MixerControl: Send {
    /// Native volume bounds of the control
    fn range(&mut self) -> Result<VolumeRange>;

    /// Current native volume (first playback channel)
    fn volume(&mut self) -> Result<NativeVolume>;

    /// Set the native volume on every playback channel
    fn set_volume(&mut self, volume: NativeVolume) -> Result<()>;

    /// Current playback switch, `true` means audible
    fn switch(&mut self) -> Result<bool>;

    /// Set the playback switch on every playback channel
    fn set_switch(&mut self, switch: bool) -> Result<()>;
}

/// Event half of a mixer backend
pub trait MixerEvents: Send {
    /// Block until the volume and/or the switch change value
    ///
    /// Never returns an empty set. An error means the event source is unusable.
    fn wait_for_event(&mut self) -> Result<EventSet>;
}

/// An opened mixer split into its two halves, so they can live on different threads
pub struct MixerDevice {
    pub control: Box<dyn MixerControl>,
    pub events: Box<dyn MixerEvents>,
}

impl MixerDevice {
    pub fn new(control: Box<dyn MixerControl>, events: Box<dyn MixerEvents>) -> Self {
        Self { control, events }
    }
}

impl fmt::Debug for MixerDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixerDevice").finish_non_exhaustive()
    }
}
