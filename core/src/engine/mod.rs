//! Audio/video pacing engine
//!
//! Owns every counter the pacing loop and delivery dispatcher share:
//! in-flight requests, buffered audio samples, the trouble detector, the
//! frameskip level, the panel rings and the presentation queue. One engine
//! per emulator session; all mutation goes through `&mut self`, so nothing
//! here needs a lock.
//!
//! Video is paced off audio occupancy rather than wall-clock frame timing:
//! a frame is requested whenever the samples already buffered plus those
//! expected from in-flight requests fall below a threshold.

use std::fmt;
use std::time::Instant;

use framepace_shared::{CONTROLLER_COUNT, ControllerButtons, PanelId};

use crate::frame_ring::FrameRing;
use crate::frameskip::{FrameskipController, ProfilingResults};
use crate::presentation::PresentationQueue;
use crate::trouble::TroubleDetector;

mod config;
mod dispatch;
mod metrics;
mod pacing;


pub use config::PacingConfig;
pub use dispatch::AudioDisposition;
pub use metrics::{PacingMetrics, PacingSnapshot};
pub use pacing::{RequestKind, TickOutcome};

/// Coarse run state reported to the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// No samples played for longer than the stuck threshold
    AudioStuck,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::AudioStuck => "audio-stuck",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A panel's buffer ring and the surface it is painted to
struct PanelOutput {
    ring: FrameRing,
    /// `None` disables the panel: it is neither requested nor rendered
    target: Option<String>,
}

/// Pacing context for one emulator session
pub struct PacingEngine {
    config: PacingConfig,
    /// Requests sent but not yet delivered
    pending_frames: u32,
    /// Samples handed to the audio sink and not yet reported played
    audio_samples_buffered: u64,
    /// Length of the most recently accepted audio batch
    last_frame_sample_count: u64,
    /// Silent requests left before the next full one
    frame_delay: u32,
    trouble: TroubleDetector,
    frameskip: FrameskipController,
    profiling: ProfilingResults,
    outputs: [PanelOutput; 2],
    inputs: [u8; CONTROLLER_COUNT],
    presentation: PresentationQueue,
    last_audio_packet: Instant,
    metrics: PacingMetrics,
}

impl PacingEngine {
    /// Create an engine for a new session starting at `now`
    pub fn new(config: PacingConfig, sample_rate: u32, now: Instant) -> Self {
        let config = config.validated();
        let outputs = PanelId::ALL.map(|id| PanelOutput {
            ring: FrameRing::for_panel(id, config.ring_capacity),
            target: None,
        });

        Self {
            pending_frames: 0,
            audio_samples_buffered: 0,
            // Close enough until the first batch arrives
            last_frame_sample_count: (sample_rate / 60) as u64,
            frame_delay: 0,
            trouble: TroubleDetector::new(),
            frameskip: FrameskipController::new(config.frameskip.clone()),
            profiling: ProfilingResults::new(),
            outputs,
            inputs: [0; CONTROLLER_COUNT],
            presentation: PresentationQueue::new(config.presentation_capacity),
            last_audio_packet: now,
            metrics: PacingMetrics::new(now),
            config,
        }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Host inputs
    // ------------------------------------------------------------------

    /// Controller 1 buttons used by subsequent requests
    pub fn set_p1_keys(&mut self, buttons: ControllerButtons) {
        self.inputs[0] = buttons.bits();
    }

    /// Controller 2 buttons used by subsequent requests
    pub fn set_p2_keys(&mut self, buttons: ControllerButtons) {
        self.inputs[1] = buttons.bits();
    }

    /// Name the surfaces each panel is painted to; `None` disables a panel.
    pub fn set_active_panels(&mut self, screen: Option<String>, piano_roll: Option<String>) {
        self.output_mut(PanelId::Screen).target = screen;
        self.output_mut(PanelId::PianoRoll).target = piano_roll;
    }

    pub fn panel_target(&self, id: PanelId) -> Option<&str> {
        self.output(id).target.as_deref()
    }

    // ------------------------------------------------------------------
    // State queries
    // ------------------------------------------------------------------

    pub fn pending_frames(&self) -> u32 {
        self.pending_frames
    }

    pub fn audio_samples_buffered(&self) -> u64 {
        self.audio_samples_buffered
    }

    pub fn last_frame_sample_count(&self) -> u64 {
        self.last_frame_sample_count
    }

    pub fn frameskip_level(&self) -> u32 {
        self.frameskip.level()
    }

    pub fn trouble(&self) -> &TroubleDetector {
        &self.trouble
    }

    pub fn profiling(&self) -> &ProfilingResults {
        &self.profiling
    }

    pub fn presentation(&self) -> &PresentationQueue {
        &self.presentation
    }

    pub fn ring(&self, id: PanelId) -> &FrameRing {
        &self.output(id).ring
    }

    pub fn metrics(&self) -> &PacingMetrics {
        &self.metrics
    }

    /// Liveness watchdog: stuck when nothing was played for too long.
    ///
    /// Purely observational; no recovery is attempted.
    pub fn run_status(&self, now: Instant) -> RunStatus {
        let since_last_packet = now.saturating_duration_since(self.last_audio_packet);
        if since_last_packet > self.config.audio_stuck_threshold() {
            RunStatus::AudioStuck
        } else {
            RunStatus::Running
        }
    }

    /// Log periodic metrics if an interval elapsed
    pub fn maybe_log_metrics(&mut self, now: Instant) -> bool {
        let snapshot = PacingSnapshot {
            audio_samples_buffered: self.audio_samples_buffered,
            pending_frames: self.pending_frames,
            frameskip_level: self.frameskip.level(),
        };
        self.metrics.maybe_log(now, snapshot)
    }

    fn output(&self, id: PanelId) -> &PanelOutput {
        &self.outputs[panel_index(id)]
    }

    fn output_mut(&mut self, id: PanelId) -> &mut PanelOutput {
        &mut self.outputs[panel_index(id)]
    }
}

fn panel_index(id: PanelId) -> usize {
    match id {
        PanelId::Screen => 0,
        PanelId::PianoRoll => 1,
    }
}
