//! Pacing health metrics

use std::time::{Duration, Instant};

use tracing::debug;

const LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Counters for diagnostics, logged and reset once per second
#[derive(Debug, Clone)]
pub struct PacingMetrics {
    /// Frame requests issued this interval
    pub frames_requested: u64,
    /// Of those, silent (frameskip) requests
    pub silent_requests: u64,
    /// Deliveries that carried at least one panel this interval
    pub frames_rendered: u64,
    /// Audio batches discarded due to overrun this interval
    pub dropped_audio_batches: u64,
    /// Deliveries that arrived with no request outstanding (lifetime)
    pub stray_deliveries: u64,
    /// Rendered frames per second over the last full interval
    pub fps: f64,
    last_log_time: Instant,
}

/// Engine state included in the periodic metrics line
#[derive(Debug, Clone, Copy)]
pub struct PacingSnapshot {
    pub audio_samples_buffered: u64,
    pub pending_frames: u32,
    pub frameskip_level: u32,
}

impl PacingMetrics {
    pub fn new(now: Instant) -> Self {
        Self {
            frames_requested: 0,
            silent_requests: 0,
            frames_rendered: 0,
            dropped_audio_batches: 0,
            stray_deliveries: 0,
            fps: 0.0,
            last_log_time: now,
        }
    }

    /// Log and reset interval counters if a second has passed.
    ///
    /// Returns true when an interval was closed.
    pub fn maybe_log(&mut self, now: Instant, snapshot: PacingSnapshot) -> bool {
        let elapsed = now.saturating_duration_since(self.last_log_time);
        if elapsed < LOG_INTERVAL {
            return false;
        }

        self.fps = self.frames_rendered as f64 / elapsed.as_secs_f64();
        debug!(
            fps = self.fps,
            requested = self.frames_requested,
            silent = self.silent_requests,
            dropped_audio = self.dropped_audio_batches,
            stray = self.stray_deliveries,
            buffered = snapshot.audio_samples_buffered,
            pending = snapshot.pending_frames,
            frameskip = snapshot.frameskip_level,
            "pacing metrics"
        );

        self.frames_requested = 0;
        self.silent_requests = 0;
        self.frames_rendered = 0;
        self.dropped_audio_batches = 0;
        self.last_log_time = now;
        true
    }
}
