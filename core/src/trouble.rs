//! Audio trouble detection
//!
//! Accumulates audio success/failure sample counts over a window of frame
//! requests. The frameskip controller reads and resets it once per window.

/// Frame requests per evaluation window
pub const TROUBLE_WINDOW_FRAMES: u32 = 60;

/// Rolling accumulator feeding the frameskip controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TroubleDetector {
    /// Samples the audio device played this window
    pub successful_samples: u64,
    /// Samples the audio device starved for this window
    pub failed_samples: u64,
    /// Frame requests issued this window
    pub frames_requested: u32,
    /// Consecutive-ish windows with too many failures
    pub trouble_count: u32,
    /// Windows in which a full render looked affordable again
    pub recovery_count: u32,
}

impl TroubleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_played(&mut self, count: u32) {
        self.successful_samples = self.successful_samples.saturating_add(count as u64);
    }

    pub fn record_underrun(&mut self, count: u32) {
        self.failed_samples = self.failed_samples.saturating_add(count as u64);
    }

    pub fn record_request(&mut self) {
        self.frames_requested = self.frames_requested.saturating_add(1);
    }

    /// Whether enough requests accumulated to evaluate a window
    pub fn window_full(&self, window: u32) -> bool {
        self.frames_requested >= window
    }

    /// Failed over successful samples.
    ///
    /// `None` when nothing was played or starved this window. Failures with
    /// no successes yield infinity.
    pub fn fail_ratio(&self) -> Option<f64> {
        match (self.failed_samples, self.successful_samples) {
            (0, 0) => None,
            (_, 0) => Some(f64::INFINITY),
            (failed, ok) => Some(failed as f64 / ok as f64),
        }
    }

    /// Clear the per-window tallies. Trouble and recovery counts persist.
    pub fn reset_window(&mut self) {
        self.successful_samples = 0;
        self.failed_samples = 0;
        self.frames_requested = 0;
    }
}
