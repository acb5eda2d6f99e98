//! Frontend runner
//!
//! Ties the pacing engine to its hosts: the worker channel, the audio sink
//! and its event feed, and the render host. [`Frontend::pump`] is one
//! iteration of the pacing timer; [`Frontend::present`] is one display
//! refresh. [`Frontend::run_until`] drives both from tokio intervals.

use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use framepace_shared::AudioEvent;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::audio::{AudioSink, next_audio_event};
use crate::config::Config;
use crate::engine::{PacingEngine, RunStatus, TickOutcome};
use crate::frameskip::FrameskipChange;
use crate::presentation::RenderHost;
use crate::rpc::RpcChannel;
use crate::worker::{WorkerGone, WorkerInbox, WorkerPort};

/// Display refresh period used by [`Frontend::run_until`]
pub const PRESENT_INTERVAL: Duration = Duration::from_micros(16_667);

/// What one pump did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    pub audio_events: usize,
    pub worker_events: usize,
    pub tick: TickOutcome,
}

/// Owns one emulator session's presentation side
pub struct Frontend<A: AudioSink, R: RenderHost> {
    engine: PacingEngine,
    port: WorkerPort,
    inbox: WorkerInbox,
    audio_events: Receiver<AudioEvent>,
    audio: A,
    render: R,
    volume: f32,
}

impl<A: AudioSink, R: RenderHost> Frontend<A, R> {
    pub fn new(
        config: &Config,
        port: WorkerPort,
        inbox: WorkerInbox,
        audio_events: Receiver<AudioEvent>,
        audio: A,
        render: R,
        now: Instant,
    ) -> Self {
        let engine = PacingEngine::new(config.pacing.clone(), config.audio.sample_rate, now);
        let mut frontend = Self {
            engine,
            port,
            inbox,
            audio_events,
            audio,
            render,
            volume: 1.0,
        };
        frontend.set_volume(config.audio.master_volume);
        frontend
    }

    pub fn engine(&self) -> &PacingEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PacingEngine {
        &mut self.engine
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn render(&self) -> &R {
        &self.render
    }

    /// Remote call channel sharing this session's worker
    pub fn rpc(&self) -> RpcChannel {
        RpcChannel::new(self.port.clone())
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set output volume, clamped to 0.0 - 1.0
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.volume = volume;
        self.audio.set_volume(volume);
    }

    /// Ask the audio device to start; hosts may require a user gesture first
    pub fn try_to_start_audio(&mut self) {
        self.audio.resume();
    }

    /// Suspend the audio device so the stuck-audio watchdog can be exercised
    pub fn intentionally_break_audio(&mut self) {
        warn!("audio intentionally suspended");
        self.audio.suspend();
    }

    pub fn run_status(&self, now: Instant) -> RunStatus {
        self.engine.run_status(now)
    }

    /// One pacing timer iteration: account for played audio, take in
    /// delivered frames, then request more.
    pub fn pump(&mut self, now: Instant) -> Result<PumpReport, WorkerGone> {
        let mut audio_events = 0;
        while let Some(event) = next_audio_event(&self.audio_events) {
            self.engine.handle_audio_event(event, now);
            audio_events += 1;
        }

        let worker_events = self.engine.pump_worker(&self.inbox, &mut self.audio)?;
        let tick = self.engine.tick(&self.port);
        match tick.frameskip {
            FrameskipChange::Raised(level) | FrameskipChange::Lowered(level) => {
                info!(level, "frameskip changed");
            }
            FrameskipChange::Unchanged => {}
        }
        self.engine.maybe_log_metrics(now);

        Ok(PumpReport {
            audio_events,
            worker_events,
            tick,
        })
    }

    /// One display refresh: paint the oldest waiting frame
    pub fn present(&mut self) -> bool {
        self.engine.present_next(&mut self.render)
    }

    /// Drive pacing and presentation until `done` returns true.
    ///
    /// Returns an error if the worker disconnects.
    pub async fn run_until(
        &mut self,
        mut done: impl FnMut(&Self) -> bool,
    ) -> Result<(), WorkerGone> {
        let mut pacing = tokio::time::interval(self.engine.config().tick_interval());
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut display = tokio::time::interval(PRESENT_INTERVAL);
        display.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !done(&*self) {
            tokio::select! {
                _ = pacing.tick() => {
                    self.pump(Instant::now())?;
                }
                _ = display.tick() => {
                    self.present();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::test_utils::{FakeWorker, RecordingAudio, RecordingRender};
    use crate::worker::worker_channel;

    fn frontend(
        samples: usize,
    ) -> (
        Frontend<RecordingAudio, RecordingRender>,
        mpsc::Sender<AudioEvent>,
        FakeWorker,
    ) {
        let (port, inbox, endpoint) = worker_channel();
        let worker = FakeWorker::spawn(endpoint, false, samples);
        let (audio_tx, audio_rx) = mpsc::channel();
        let mut frontend = Frontend::new(
            &Config::default(),
            port,
            inbox,
            audio_rx,
            RecordingAudio::default(),
            RecordingRender::default(),
            Instant::now(),
        );
        frontend
            .engine_mut()
            .set_active_panels(Some("screen".into()), None);
        (frontend, audio_tx, worker)
    }

    #[test]
    fn volume_is_clamped_and_forwarded() {
        let (mut frontend, _audio, _worker) = frontend(0);
        assert_eq!(frontend.audio().volume, Some(1.0));
        frontend.set_volume(1.7);
        assert_eq!(frontend.volume(), 1.0);
        frontend.set_volume(-0.5);
        assert_eq!(frontend.audio().volume, Some(0.0));
        frontend.set_volume(0.25);
        assert_eq!(frontend.audio().volume, Some(0.25));
    }

    #[test]
    fn audio_lifecycle_hooks_reach_sink() {
        let (mut frontend, _audio, _worker) = frontend(0);
        frontend.try_to_start_audio();
        frontend.intentionally_break_audio();
        assert_eq!(frontend.audio().resumed, 1);
        assert_eq!(frontend.audio().suspended, 1);
    }

    #[test]
    fn pump_consumes_audio_events_before_ticking() {
        let (mut frontend, audio, _worker) = frontend(735);
        let now = Instant::now();
        let first = frontend.pump(now).unwrap();
        assert_eq!(first.tick.requests_issued(), 4);

        audio.send(AudioEvent::Played(100)).unwrap();
        audio.send(AudioEvent::Underrun(5)).unwrap();
        let report = frontend.pump(now).unwrap();
        assert_eq!(report.audio_events, 2);
        assert_eq!(frontend.engine().trouble().failed_samples, 5);
    }

    #[test]
    fn pump_reports_disconnected_worker() {
        let (port, inbox, endpoint) = worker_channel();
        let (_audio_tx, audio_rx) = mpsc::channel();
        let mut frontend = Frontend::new(
            &Config::default(),
            port,
            inbox,
            audio_rx,
            RecordingAudio::default(),
            RecordingRender::default(),
            Instant::now(),
        );
        drop(endpoint);
        assert_eq!(frontend.pump(Instant::now()), Err(WorkerGone));
    }

    #[tokio::test]
    async fn run_until_paints_frames() {
        let (mut frontend, audio, _worker) = frontend(735);
        // Keep the device draining so pacing never stalls on buffered audio
        let drain = std::thread::spawn(move || {
            for _ in 0..200 {
                if audio.send(AudioEvent::Played(735)).is_err() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(2));
            }
        });

        frontend
            .run_until(|f| f.render().paints.len() >= 3)
            .await
            .unwrap();
        assert!(frontend.render().paints.iter().all(|p| p.target == "screen"));
        assert!(frontend.audio().samples.len() >= 735);
        drop(frontend);
        drain.join().unwrap();
    }
}
