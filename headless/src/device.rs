//! Simulated audio device
//!
//! A background thread drains queued samples at the configured rate, as a
//! sound card would, and reports what it played or starved for. Samples cross
//! to the device through a lock-free ring buffer so queuing never waits on
//! the device thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use framepace_core::AudioSink;
use framepace_shared::AudioEvent;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::debug;

/// How often the device pulls a chunk of samples
const PERIOD: Duration = Duration::from_millis(10);

/// Flags and levels shared with the device thread.
///
/// f32 values are stored as raw bits. Non-negative floats order the same as
/// their bit patterns, so `fetch_max` on the bits tracks the peak.
#[derive(Debug)]
struct DeviceControls {
    volume: AtomicU32,
    running: AtomicBool,
    peak: AtomicU32,
    shutdown: AtomicBool,
}

impl DeviceControls {
    fn new() -> Self {
        Self {
            volume: AtomicU32::new(1.0f32.to_bits()),
            running: AtomicBool::new(false),
            peak: AtomicU32::new(0.0f32.to_bits()),
            shutdown: AtomicBool::new(false),
        }
    }
}

/// Host-side handle; implements [`AudioSink`] for the frontend
pub struct SimulatedAudio {
    producer: HeapProd<f32>,
    controls: Arc<DeviceControls>,
    thread: Option<JoinHandle<()>>,
}

impl SimulatedAudio {
    /// Start the device clock with one second of sample headroom. Playback
    /// begins suspended until [`AudioSink::resume`] is called.
    pub fn spawn(sample_rate: u32, events: Sender<AudioEvent>) -> std::io::Result<Self> {
        Self::with_capacity(sample_rate, sample_rate.max(1) as usize, events)
    }

    /// Start the device clock with a ring of `capacity` samples
    pub fn with_capacity(
        sample_rate: u32,
        capacity: usize,
        events: Sender<AudioEvent>,
    ) -> std::io::Result<Self> {
        let ring = HeapRb::<f32>::new(capacity.max(1));
        let (producer, consumer) = ring.split();
        let controls = Arc::new(DeviceControls::new());

        let thread_controls = controls.clone();
        let thread = thread::Builder::new()
            .name("simulated-audio".into())
            .spawn(move || device_loop(sample_rate, consumer, thread_controls, events))?;

        Ok(Self {
            producer,
            controls,
            thread: Some(thread),
        })
    }

    /// Loudest sample played so far, after volume
    pub fn peak(&self) -> f32 {
        f32::from_bits(self.controls.peak.load(Ordering::Relaxed))
    }

    /// Samples waiting for the device
    pub fn queued(&self) -> usize {
        self.producer.occupied_len()
    }
}

impl AudioSink for SimulatedAudio {
    fn queue_samples(&mut self, samples: &[f32]) {
        let pushed = self.producer.push_slice(samples);
        if pushed < samples.len() {
            debug!(
                dropped = samples.len() - pushed,
                "audio ring full, dropping samples"
            );
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.controls
            .volume
            .store(volume.to_bits(), Ordering::Relaxed);
    }

    fn resume(&mut self) {
        debug!("audio device resumed");
        self.controls.running.store(true, Ordering::Relaxed);
    }

    fn suspend(&mut self) {
        debug!("audio device suspended");
        self.controls.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for SimulatedAudio {
    fn drop(&mut self) {
        self.controls.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn device_loop(
    sample_rate: u32,
    mut consumer: HeapCons<f32>,
    controls: Arc<DeviceControls>,
    events: Sender<AudioEvent>,
) {
    let mut last = Instant::now();
    // Fractional samples carried between periods
    let mut owed = 0.0f64;
    // Reused output buffer, as a device callback would be handed
    let mut output = Vec::new();

    while !controls.shutdown.load(Ordering::Relaxed) {
        thread::sleep(PERIOD);
        let now = Instant::now();
        owed += now.duration_since(last).as_secs_f64() * sample_rate as f64;
        last = now;
        let wanted = owed as usize;
        owed -= wanted as f64;

        if !controls.running.load(Ordering::Relaxed) {
            continue;
        }

        output.resize(wanted, 0.0f32);
        let played = consumer.pop_slice(&mut output);
        let volume = f32::from_bits(controls.volume.load(Ordering::Relaxed));
        let peak = output[..played]
            .iter()
            .fold(0.0f32, |peak, s| peak.max((s * volume).abs()));
        controls.peak.fetch_max(peak.to_bits(), Ordering::Relaxed);
        let starved = wanted - played;

        if played > 0 && events.send(AudioEvent::Played(played as u32)).is_err() {
            break;
        }
        if starved > 0 && events.send(AudioEvent::Underrun(starved as u32)).is_err() {
            break;
        }
    }
}
