//! Audio host seam
//!
//! The pacing engine hands finished sample batches to an [`AudioSink`] and
//! learns what the device actually played through [`AudioEvent`]s sent back
//! on a channel. Device playback itself lives outside this crate.

use std::sync::mpsc::{Receiver, TryRecvError};

use framepace_shared::AudioEvent;

/// Default output sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Audio output device
pub trait AudioSink {
    /// Queue a batch of mono samples for playback
    fn queue_samples(&mut self, samples: &[f32]);

    /// Set output volume (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32);

    /// Start or resume playback
    fn resume(&mut self) {}

    /// Suspend playback; the device stops reporting played samples
    fn suspend(&mut self) {}
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn queue_samples(&mut self, _samples: &[f32]) {}
    fn set_volume(&mut self, _volume: f32) {}
}

/// Non-blocking drain of the device's event channel.
///
/// Returns `None` when the queue is empty or the device hung up.
pub fn next_audio_event(events: &Receiver<AudioEvent>) -> Option<AudioEvent> {
    match events.try_recv() {
        Ok(event) => Some(event),
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
}
