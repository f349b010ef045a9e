//! ALSA simple-mixer backend
//!
//! Get/set calls open a fresh mixer handle on the device each time, so every
//! read reflects the current hardware state without having to pump the
//! mixer's own event queue. Change notifications come from a control handle
//! on the card subscribed to element events; an element value event is only
//! reported once re-reading the control shows the volume or switch actually
//! moved.

use alsa::ctl::Ctl;
use alsa::mixer::{Mixer, Selem, SelemChannelId, SelemId};
use mixcast_core::domain::{
    EventSet, MixerControl, MixerDevice, MixerError, MixerEvents, NativeVolume, VolumeRange,
};
use std::fmt;
use tracing::{debug, info, trace};

type Result<T> = std::result::Result<T, MixerError>;

/// Open `control` on `device` for get/set and `card` for change events
pub fn open(card: &str, device: &str, control: &str) -> Result<MixerDevice> {
    let selem = AlsaControl {
        device: device.to_string(),
        name: control.to_string(),
    };

    // Fails early when the device or the control does not exist
    let (volume, switch) = selem.read_state()?;
    let range = selem.read_range()?;
    info!(card, device, control, %range, volume, switch, "Opened ALSA mixer");

    let ctl = Ctl::new(card, false).map_err(|e| MixerError::Open {
        what: "card",
        name: card.to_string(),
        reason: e.to_string(),
    })?;
    ctl.subscribe_events(true).map_err(|e| MixerError::Open {
        what: "card",
        name: card.to_string(),
        reason: format!("cannot subscribe to events: {e}"),
    })?;

    let events = AlsaEvents {
        ctl,
        control: selem.clone(),
        volume,
        switch,
    };

    Ok(MixerDevice::new(Box::new(selem), Box::new(events)))
}

fn device_error(e: alsa::Error) -> MixerError {
    MixerError::Device(e.to_string())
}

/// One simple control on one mixer device
#[derive(Debug, Clone)]
struct AlsaControl {
    device: String,
    name: String,
}

impl AlsaControl {
    fn with_selem<T>(&self, op: impl FnOnce(&Selem<'_>) -> alsa::Result<T>) -> Result<T> {
        let mixer = Mixer::new(&self.device, false).map_err(|e| MixerError::Open {
            what: "device",
            name: self.device.clone(),
            reason: e.to_string(),
        })?;
        let id = SelemId::new(&self.name, 0);
        let selem = mixer
            .find_selem(&id)
            .ok_or_else(|| MixerError::ControlNotFound(self.name.clone()))?;
        op(&selem).map_err(device_error)
    }

    fn read_state(&self) -> Result<(NativeVolume, bool)> {
        self.with_selem(|selem| {
            let volume = selem.get_playback_volume(SelemChannelId::FrontLeft)?;
            let switch = selem.get_playback_switch(SelemChannelId::FrontLeft)?;
            Ok((volume, switch != 0))
        })
    }

    fn read_range(&self) -> Result<VolumeRange> {
        let (min, max) = self.with_selem(|selem| Ok(selem.get_playback_volume_range()))?;
        VolumeRange::new(min, max)
    }
}

impl MixerControl for AlsaControl {
    fn range(&mut self) -> Result<VolumeRange> {
        self.read_range()
    }

    fn volume(&mut self) -> Result<NativeVolume> {
        self.with_selem(|selem| selem.get_playback_volume(SelemChannelId::FrontLeft))
    }

    fn set_volume(&mut self, volume: NativeVolume) -> Result<()> {
        trace!(volume, control = %self.name, "ALSA set volume");
        self.with_selem(|selem| selem.set_playback_volume_all(volume))
    }

    fn switch(&mut self) -> Result<bool> {
        self.with_selem(|selem| selem.get_playback_switch(SelemChannelId::FrontLeft))
            .map(|switch| switch != 0)
    }

    fn set_switch(&mut self, switch: bool) -> Result<()> {
        trace!(switch, control = %self.name, "ALSA set switch");
        self.with_selem(|selem| selem.set_playback_switch_all(i32::from(switch)))
    }
}

/// Card event subscription plus the last values reported
struct AlsaEvents {
    ctl: Ctl,
    control: AlsaControl,
    volume: NativeVolume,
    switch: bool,
}

impl AlsaEvents {
    /// Block for the next card event, true if it touched an element value
    fn next_value_event(&self) -> Result<bool> {
        match self.ctl.read().map_err(device_error)? {
            Some(event) => Ok(event.get_mask().value()),
            None => Ok(false),
        }
    }
}

impl MixerEvents for AlsaEvents {
    fn wait_for_event(&mut self) -> Result<EventSet> {
        loop {
            if !self.next_value_event()? {
                continue;
            }

            let (volume, switch) = self.control.read_state()?;
            let mut changes = EventSet::default();
            if volume != self.volume {
                self.volume = volume;
                changes.volume = Some(volume);
            }
            if switch != self.switch {
                self.switch = switch;
                changes.switch = Some(switch);
            }

            if changes.is_empty() {
                trace!("Element event without volume/switch change");
                continue;
            }
            debug!(?changes, "Hardware change");
            return Ok(changes);
        }
    }
}

impl fmt::Debug for AlsaEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlsaEvents")
            .field("control", &self.control)
            .field("volume", &self.volume)
            .field("switch", &self.switch)
            .finish_non_exhaustive()
    }
}
