//! Delivery dispatcher: consumes everything the worker and audio device
//! send back

use std::time::Instant;

use framepace_shared::{AudioEvent, FrameDelivery, PerformanceReport};
use tracing::{debug, trace, warn};

use crate::audio::AudioSink;
use crate::presentation::{PresentedFrame, PresentedPanel, RenderHost};
use crate::worker::{WorkerEvent, WorkerGone, WorkerInbox};

use super::PacingEngine;

/// What happened to a delivered audio batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDisposition {
    /// Forwarded to the sink
    Queued(usize),
    /// Discarded: too many samples already buffered
    Dropped(usize),
}

impl PacingEngine {
    /// Drain every event currently waiting in the worker inbox.
    ///
    /// Returns how many events were handled.
    pub fn pump_worker(
        &mut self,
        inbox: &WorkerInbox,
        audio: &mut dyn AudioSink,
    ) -> Result<usize, WorkerGone> {
        let mut handled = 0;
        while let Some(event) = inbox.try_next()? {
            self.handle_worker_event(event, audio);
            handled += 1;
        }
        Ok(handled)
    }

    pub fn handle_worker_event(&mut self, event: WorkerEvent, audio: &mut dyn AudioSink) {
        match event {
            WorkerEvent::DeliverFrame(delivery) => {
                self.handle_delivery(delivery, audio);
            }
            WorkerEvent::ReportPerformance(report) => self.handle_performance(report),
        }
    }

    /// Accept a finished frame from the worker
    pub fn handle_delivery(
        &mut self,
        delivery: FrameDelivery,
        audio: &mut dyn AudioSink,
    ) -> AudioDisposition {
        let FrameDelivery {
            panels,
            audio_buffer,
        } = delivery;

        if !panels.is_empty() {
            let presented: Vec<PresentedPanel> = panels
                .into_iter()
                .map(|panel| {
                    let slot = self
                        .output_mut(panel.id)
                        .ring
                        .return_filled(panel.image_buffer);
                    PresentedPanel {
                        id: panel.id,
                        target: panel.target,
                        width: panel.width,
                        height: panel.height,
                        slot,
                    }
                })
                .collect();
            self.presentation.push(PresentedFrame { panels: presented });
            self.metrics.frames_rendered += 1;
        }

        if self.pending_frames == 0 {
            self.metrics.stray_deliveries += 1;
            warn!("frame delivered with no request outstanding");
        } else {
            self.pending_frames -= 1;
        }

        let len = audio_buffer.len();
        if self.audio_samples_buffered < self.config.audio_overrun_sample_threshold {
            audio.queue_samples(&audio_buffer);
            self.audio_samples_buffered += len as u64;
            self.last_frame_sample_count = len as u64;
            AudioDisposition::Queued(len)
        } else {
            // Running too fast (e.g. fast-forward): drop these on the floor
            self.metrics.dropped_audio_batches += 1;
            trace!(
                len,
                buffered = self.audio_samples_buffered,
                "audio overrun, dropping batch"
            );
            AudioDisposition::Dropped(len)
        }
    }

    /// Account for a played/underrun notification from the audio device
    pub fn handle_audio_event(&mut self, event: AudioEvent, now: Instant) {
        match event {
            AudioEvent::Played(count) => {
                self.audio_samples_buffered =
                    self.audio_samples_buffered.saturating_sub(count as u64);
                self.trouble.record_played(count);
                self.last_audio_packet = now;
            }
            AudioEvent::Underrun(count) => {
                self.trouble.record_underrun(count);
            }
        }
    }

    pub fn handle_performance(&mut self, report: PerformanceReport) {
        trace!(
            event = %report.event_name,
            average_ms = report.average_duration,
            "performance report"
        );
        self.profiling
            .record(&report.event_name, report.average_duration);
    }

    /// Display-refresh callback: paint the oldest waiting frame.
    ///
    /// Returns false when nothing was waiting.
    pub fn present_next(&mut self, render: &mut dyn RenderHost) -> bool {
        let Some(frame) = self.presentation.pop() else {
            return false;
        };
        for panel in &frame.panels {
            match self.output(panel.id).ring.filled(panel.slot) {
                Some(pixels) => render.paint(&panel.target, pixels, panel.width, panel.height),
                None => debug!(
                    panel = %panel.id,
                    slot = panel.slot,
                    "buffer already lent back to worker, skipping paint"
                ),
            }
        }
        true
    }

    /// Drop frames waiting for display
    pub fn clear_presentation(&mut self) {
        self.presentation.clear();
    }
}
