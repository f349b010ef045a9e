//! In-memory mixer
//!
//! Behaves like a sound card from the server's point of view: every write that
//! changes a value queues a change event, and `wait_for_event` blocks the
//! calling thread until one is pending. Writes that keep the value unchanged
//! raise nothing, the same way the ALSA backend diffs against the last state.
//!
//! Clones share state, so a test can keep one clone to play the role of the
//! physical knob while the server owns the others.

use mixcast_core::domain::{
    EventSet, MixerControl, MixerDevice, MixerError, MixerEvents, NativeVolume, VolumeRange,
};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::trace;

type Result<T> = std::result::Result<T, MixerError>;

/// Most recent writes kept per control
pub const WRITE_LOG_LEN: usize = 256;

#[derive(Debug)]
struct SoftState {
    range: VolumeRange,
    volume: NativeVolume,
    switch: bool,
    pending: EventSet,
    fault: Option<String>,
    volume_writes: VecDeque<NativeVolume>,
    switch_writes: VecDeque<bool>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SoftState>,
    changed: Condvar,
}

/// Software mixer control with hardware-like change events
#[derive(Debug, Clone)]
pub struct SoftMixer {
    shared: Arc<Shared>,
}

impl SoftMixer {
    /// Create a mixer; `volume` is clamped into `range`
    pub fn new(range: VolumeRange, volume: NativeVolume, switch: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SoftState {
                    range,
                    volume: range.clamp(volume),
                    switch,
                    pending: EventSet::default(),
                    fault: None,
                    volume_writes: VecDeque::new(),
                    switch_writes: VecDeque::new(),
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Split into control and event halves backed by this mixer
    pub fn device(&self) -> MixerDevice {
        MixerDevice::new(Box::new(self.clone()), Box::new(self.clone()))
    }

    fn state(&self) -> MutexGuard<'_, SoftState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_volume(&self) -> NativeVolume {
        self.state().volume
    }

    pub fn current_switch(&self) -> bool {
        self.state().switch
    }

    /// Native volumes written through the control half, oldest first
    ///
    /// Only the last [`WRITE_LOG_LEN`] writes are kept.
    pub fn volume_writes(&self) -> Vec<NativeVolume> {
        self.state().volume_writes.iter().copied().collect()
    }

    /// Switch values written through the control half, oldest first
    pub fn switch_writes(&self) -> Vec<bool> {
        self.state().switch_writes.iter().copied().collect()
    }

    /// Change the volume from the hardware side, as a physical knob would
    pub fn turn_knob(&self, volume: NativeVolume) {
        let mut state = self.state();
        apply_volume(&mut state, volume);
        drop(state);
        self.shared.changed.notify_all();
    }

    /// Flip the switch from the hardware side
    pub fn press_switch(&self, switch: bool) {
        let mut state = self.state();
        apply_switch(&mut state, switch);
        drop(state);
        self.shared.changed.notify_all();
    }

    /// Make the event source fail, as an unplugged card would
    pub fn fail(&self, reason: impl Into<String>) {
        self.state().fault = Some(reason.into());
        self.shared.changed.notify_all();
    }
}

fn record<T>(log: &mut VecDeque<T>, value: T) {
    if log.len() == WRITE_LOG_LEN {
        log.pop_front();
    }
    log.push_back(value);
}

fn apply_volume(state: &mut SoftState, volume: NativeVolume) {
    let volume = state.range.clamp(volume);
    if volume != state.volume {
        state.volume = volume;
        state.pending.merge(EventSet::volume(volume));
    }
}

fn apply_switch(state: &mut SoftState, switch: bool) {
    if switch != state.switch {
        state.switch = switch;
        state.pending.merge(EventSet::switch(switch));
    }
}

impl MixerControl for SoftMixer {
    fn range(&mut self) -> Result<VolumeRange> {
        Ok(self.state().range)
    }

    fn volume(&mut self) -> Result<NativeVolume> {
        Ok(self.state().volume)
    }

    fn set_volume(&mut self, volume: NativeVolume) -> Result<()> {
        trace!(volume, "soft mixer set_volume");
        let mut state = self.state();
        record(&mut state.volume_writes, volume);
        apply_volume(&mut state, volume);
        drop(state);
        self.shared.changed.notify_all();
        Ok(())
    }

    fn switch(&mut self) -> Result<bool> {
        Ok(self.state().switch)
    }

    fn set_switch(&mut self, switch: bool) -> Result<()> {
        trace!(switch, "soft mixer set_switch");
        let mut state = self.state();
        record(&mut state.switch_writes, switch);
        apply_switch(&mut state, switch);
        drop(state);
        self.shared.changed.notify_all();
        Ok(())
    }
}

impl MixerEvents for SoftMixer {
    fn wait_for_event(&mut self) -> Result<EventSet> {
        let mut state = self.state();
        loop {
            if let Some(reason) = &state.fault {
                return Err(MixerError::Device(reason.clone()));
            }
            if !state.pending.is_empty() {
                return Ok(state.pending.take());
            }
            state = self
                .shared
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
