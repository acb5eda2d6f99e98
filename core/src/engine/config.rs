//! Pacing engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::frame_ring::DEFAULT_RING_CAPACITY;
use crate::frameskip::FrameskipConfig;
use crate::presentation::DEFAULT_PRESENTATION_CAPACITY;

/// Pacing engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Pacing tick period in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Upper bound on requests issued in one tick (catch-up burst)
    #[serde(default = "default_max_requests_per_tick")]
    pub max_requests_per_tick: u32,
    /// Hard cap on in-flight frame requests (must not exceed ring capacity)
    #[serde(default = "default_max_pending_frames")]
    pub max_pending_frames: u32,
    /// Request a new frame while buffered + pending samples stay below this
    #[serde(default = "default_new_frame_sample_threshold")]
    pub new_frame_sample_threshold: u64,
    /// Drop delivered audio while this many samples are already buffered
    #[serde(default = "default_audio_overrun_sample_threshold")]
    pub audio_overrun_sample_threshold: u64,
    /// Buffers per panel ring
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    /// Frames kept waiting for display
    #[serde(default = "default_presentation_capacity")]
    pub presentation_capacity: usize,
    /// Report the audio pipeline as stuck after this long without playback
    #[serde(default = "default_audio_stuck_threshold_ms")]
    pub audio_stuck_threshold_ms: u64,
    #[serde(default)]
    pub frameskip: FrameskipConfig,
}

fn default_tick_interval_ms() -> u64 {
    1
}
fn default_max_requests_per_tick() -> u32 {
    4
}
fn default_max_pending_frames() -> u32 {
    10
}
fn default_new_frame_sample_threshold() -> u64 {
    4096
}
fn default_audio_overrun_sample_threshold() -> u64 {
    8192
}
fn default_ring_capacity() -> usize {
    DEFAULT_RING_CAPACITY
}
fn default_presentation_capacity() -> usize {
    DEFAULT_PRESENTATION_CAPACITY
}
fn default_audio_stuck_threshold_ms() -> u64 {
    2000
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_requests_per_tick: default_max_requests_per_tick(),
            max_pending_frames: default_max_pending_frames(),
            new_frame_sample_threshold: default_new_frame_sample_threshold(),
            audio_overrun_sample_threshold: default_audio_overrun_sample_threshold(),
            ring_capacity: default_ring_capacity(),
            presentation_capacity: default_presentation_capacity(),
            audio_stuck_threshold_ms: default_audio_stuck_threshold_ms(),
            frameskip: FrameskipConfig::default(),
        }
    }
}

impl PacingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn audio_stuck_threshold(&self) -> Duration {
        Duration::from_millis(self.audio_stuck_threshold_ms)
    }

    /// Clamp values the engine cannot run with.
    ///
    /// The in-flight cap is the only thing keeping the write cursor from
    /// lapping unpresented buffers, so it may not exceed the ring size.
    pub fn validated(mut self) -> Self {
        self.ring_capacity = self.ring_capacity.max(1);
        if self.max_pending_frames as usize > self.ring_capacity {
            tracing::warn!(
                max_pending_frames = self.max_pending_frames,
                ring_capacity = self.ring_capacity,
                "in-flight cap exceeds ring capacity, clamping"
            );
            self.max_pending_frames = self.ring_capacity as u32;
        }
        self.max_requests_per_tick = self.max_requests_per_tick.max(1);
        // An empty window would be evaluated on every tick
        self.frameskip.window_frames = self.frameskip.window_frames.max(1);
        self
    }
}
