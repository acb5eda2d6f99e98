//! Pacing loop: decides when to ask the worker for another frame

use framepace_shared::{FrameRequest, PanelRequest};
use tracing::{trace, warn};

use crate::frameskip::FrameskipChange;
use crate::worker::{WorkerGone, WorkerPort};

use super::PacingEngine;

/// What kind of request was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Panels requested; consumed one slot from each active ring
    Full,
    /// Frameskip: emulation advances, nothing is rendered
    Silent,
}

/// Result of one pacing tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub full_requests: u32,
    pub silent_requests: u32,
    pub frameskip: FrameskipChange,
}

impl TickOutcome {
    pub fn requests_issued(&self) -> u32 {
        self.full_requests + self.silent_requests
    }
}

impl PacingEngine {
    /// Whether another request may be sent right now.
    ///
    /// Requires room under the in-flight cap, and that buffered audio plus
    /// the audio expected from in-flight requests is below the threshold.
    pub fn wants_frame(&self) -> bool {
        if self.pending_frames >= self.config.max_pending_frames {
            return false;
        }
        let pending_samples = self.pending_frames as u64 * self.last_frame_sample_count;
        self.audio_samples_buffered + pending_samples < self.config.new_frame_sample_threshold
    }

    /// Run one pacing tick.
    ///
    /// Timers on constrained hosts can fire late, so a tick may issue up to
    /// `max_requests_per_tick` requests to catch up. The frameskip controller
    /// is evaluated afterwards once a full window of requests accumulated.
    pub fn tick(&mut self, port: &WorkerPort) -> TickOutcome {
        let mut outcome = TickOutcome {
            full_requests: 0,
            silent_requests: 0,
            frameskip: FrameskipChange::Unchanged,
        };

        for _ in 0..self.config.max_requests_per_tick {
            if !self.wants_frame() {
                break;
            }
            match self.request_frame(port) {
                Ok(RequestKind::Full) => outcome.full_requests += 1,
                Ok(RequestKind::Silent) => outcome.silent_requests += 1,
                Err(WorkerGone) => {
                    warn!("worker gone, frame request not sent");
                    break;
                }
            }
        }

        outcome.frameskip = self.frameskip.evaluate(&mut self.trouble, &self.profiling);
        outcome
    }

    /// Send one frame request, honoring the frameskip countdown.
    ///
    /// Callers are expected to check [`wants_frame`](Self::wants_frame);
    /// this does not enforce the in-flight cap itself.
    pub fn request_frame(&mut self, port: &WorkerPort) -> Result<RequestKind, WorkerGone> {
        let [p1, p2] = self.inputs;

        if self.frame_delay > 0 {
            port.request_frame(FrameRequest {
                p1,
                p2,
                panels: Vec::new(),
            })?;
            self.frame_delay -= 1;
            self.record_request();
            self.metrics.silent_requests += 1;
            trace!(remaining = self.frame_delay, "silent frame requested");
            return Ok(RequestKind::Silent);
        }

        let panels: Vec<PanelRequest> = self
            .outputs
            .iter_mut()
            .filter_map(|output| {
                let target = output.target.clone()?;
                let buffer = output.ring.acquire_write_slot();
                Some(PanelRequest {
                    id: output.ring.panel(),
                    target,
                    dest_buffer: buffer.into_inner(),
                })
            })
            .collect();

        port.request_frame(FrameRequest { p1, p2, panels })?;
        self.record_request();
        self.frame_delay = self.frameskip.level();
        trace!(pending = self.pending_frames, "frame requested");
        Ok(RequestKind::Full)
    }

    fn record_request(&mut self) {
        self.pending_frames += 1;
        self.trouble.record_request();
        self.metrics.frames_requested += 1;
    }
}
