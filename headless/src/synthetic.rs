//! Synthetic emulator worker
//!
//! Stands in for the real emulator thread: renders patterned panels, produces
//! one frame of audio per request, reports render and idle timings, and keeps
//! save-RAM in memory.

use std::f32::consts::TAU;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use framepace_core::frameskip::{IDLE_EVENT, RENDER_COST_EVENT};
use framepace_core::worker::{WorkerCommand, WorkerEndpoint, WorkerEvent};
use framepace_shared::{
    DeliveredPanel, FrameDelivery, FrameRequest, PerformanceReport, RpcCall, RpcReply, RpcValue,
};
use tracing::{debug, info};

/// Save-RAM size of the synthetic cartridge
pub const SRAM_SIZE: usize = 8 * 1024;

/// Frames between performance reports
const REPORT_INTERVAL: u32 = 60;

/// Cost model for the synthetic worker
#[derive(Debug, Clone, Copy)]
pub struct WorkerProfile {
    /// Audio samples produced per emulated frame
    pub samples_per_frame: usize,
    pub sample_rate: u32,
    /// Time to emulate one frame, before slowdown
    pub emulate_cost: Duration,
    /// Extra time to render panels for a full frame, before slowdown
    pub render_cost: Duration,
    /// Multiplier applied to every cost
    pub slowdown: f64,
}

impl WorkerProfile {
    fn scaled(&self, cost: Duration) -> Duration {
        cost.mul_f64(self.slowdown.max(0.0))
    }
}

/// Running averages reported back as performance events
#[derive(Debug, Default)]
struct Timings {
    render_total: Duration,
    renders: u32,
    idle_total: Duration,
    frames: u32,
}

impl Timings {
    fn average_ms(total: Duration, count: u32) -> f64 {
        if count == 0 {
            0.0
        } else {
            total.as_secs_f64() * 1000.0 / count as f64
        }
    }
}

struct SyntheticWorker {
    profile: WorkerProfile,
    endpoint: WorkerEndpoint,
    sram: Option<Vec<u8>>,
    frame: u64,
    phase: f32,
    timings: Timings,
}

/// Spawn the worker thread. It exits once the command channel closes.
pub fn spawn(endpoint: WorkerEndpoint, profile: WorkerProfile) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("synthetic-worker".into())
        .spawn(move || {
            SyntheticWorker {
                profile,
                endpoint,
                sram: None,
                frame: 0,
                phase: 0.0,
                timings: Timings::default(),
            }
            .run()
        })
}

impl SyntheticWorker {
    fn run(mut self) {
        loop {
            let waiting = Instant::now();
            let Ok(command) = self.endpoint.commands.recv() else {
                break;
            };
            self.timings.idle_total += waiting.elapsed();

            let sent = match command {
                WorkerCommand::RequestFrame(request) => self.run_frame(request),
                WorkerCommand::Rpc { call, reply } => {
                    // Caller may have stopped waiting; nothing to do then
                    let _ = reply.send(self.handle_rpc(call));
                    true
                }
            };
            if !sent {
                break;
            }
        }
        debug!(frames = self.frame, "synthetic worker stopped");
    }

    fn run_frame(&mut self, request: FrameRequest) -> bool {
        thread::sleep(self.profile.scaled(self.profile.emulate_cost));
        self.frame += 1;
        let audio_buffer = self.generate_audio();

        let mut panels = Vec::with_capacity(request.panels.len());
        if !request.panels.is_empty() {
            let started = Instant::now();
            thread::sleep(self.profile.scaled(self.profile.render_cost));
            for panel in request.panels {
                let (width, height) = panel.id.dimensions();
                let mut image_buffer = panel.dest_buffer;
                paint_pattern(&mut image_buffer, self.frame, request.p1);
                panels.push(DeliveredPanel {
                    id: panel.id,
                    target: panel.target,
                    width,
                    height,
                    image_buffer,
                });
            }
            self.timings.render_total += started.elapsed();
            self.timings.renders += 1;
        }

        let delivered = self
            .endpoint
            .events
            .send(WorkerEvent::DeliverFrame(FrameDelivery {
                panels,
                audio_buffer,
            }))
            .is_ok();

        self.timings.frames += 1;
        if self.timings.frames >= REPORT_INTERVAL {
            self.report_performance();
        }
        delivered
    }

    fn report_performance(&mut self) {
        let render = Timings::average_ms(self.timings.render_total, self.timings.renders);
        let idle = Timings::average_ms(self.timings.idle_total, self.timings.frames);
        for (event_name, average_duration) in [(RENDER_COST_EVENT, render), (IDLE_EVENT, idle)] {
            let _ = self
                .endpoint
                .events
                .send(WorkerEvent::ReportPerformance(PerformanceReport {
                    event_name: event_name.to_string(),
                    average_duration,
                }));
        }
        self.timings = Timings::default();
    }

    /// A quiet 440 Hz tone, continuous across frames
    fn generate_audio(&mut self) -> Vec<f32> {
        let step = TAU * 440.0 / self.profile.sample_rate.max(1) as f32;
        (0..self.profile.samples_per_frame)
            .map(|_| {
                let sample = self.phase.sin() * 0.1;
                self.phase = (self.phase + step) % TAU;
                sample
            })
            .collect()
    }

    fn handle_rpc(&mut self, call: RpcCall) -> RpcReply {
        match (call.func.as_str(), call.args.into_iter().next()) {
            ("has_sram", _) => RpcReply::Result(RpcValue::Bool(self.sram.is_some())),
            ("get_sram", _) => match &self.sram {
                Some(sram) => RpcReply::Result(RpcValue::Bytes(sram.clone())),
                None => RpcReply::Error("cartridge has no save-RAM".into()),
            },
            ("set_sram", Some(RpcValue::Bytes(bytes))) => match self.sram.as_mut() {
                Some(sram) => {
                    let len = bytes.len().min(sram.len());
                    sram[..len].copy_from_slice(&bytes[..len]);
                    RpcReply::Result(RpcValue::Unit)
                }
                None => RpcReply::Error("cartridge has no save-RAM".into()),
            },
            ("load_cartridge", Some(RpcValue::Bytes(cart))) => {
                info!(len = cart.len(), "synthetic cartridge inserted");
                self.frame = 0;
                // First byte marks battery-backed carts
                self.sram = cart
                    .first()
                    .is_some_and(|flags| flags & 1 != 0)
                    .then(|| vec![0; SRAM_SIZE]);
                RpcReply::Result(RpcValue::Unit)
            }
            (func, _) => RpcReply::Error(format!("unknown function {func}")),
        }
    }
}

/// Scrolling gradient; holding any button tints it
fn paint_pattern(pixels: &mut [u8], frame: u64, buttons: u8) {
    let shift = (frame % 256) as u8;
    for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
        let v = (i as u8).wrapping_add(shift);
        px[0] = v;
        px[1] = v.wrapping_mul(3);
        px[2] = if buttons != 0 { 0xFF } else { v / 2 };
        px[3] = 0xFF;
    }
}

#[cfg(test)]
mod tests {
    use framepace_core::RpcChannel;
    use framepace_core::worker::worker_channel;
    use framepace_shared::{PanelId, PanelRequest};

    use super::*;

    fn fast_profile() -> WorkerProfile {
        WorkerProfile {
            samples_per_frame: 735,
            sample_rate: 44_100,
            emulate_cost: Duration::ZERO,
            render_cost: Duration::ZERO,
            slowdown: 1.0,
        }
    }

    #[test]
    fn delivers_panels_and_one_frame_of_audio() {
        let (port, inbox, endpoint) = worker_channel();
        let handle = spawn(endpoint, fast_profile()).unwrap();
        port.request_frame(FrameRequest {
            p1: 0,
            p2: 0,
            panels: vec![PanelRequest {
                id: PanelId::Screen,
                target: "screen".into(),
                dest_buffer: vec![0; PanelId::Screen.buffer_len()],
            }],
        })
        .unwrap();

        let event = loop {
            if let Some(event) = inbox.try_next().unwrap() {
                break event;
            }
            thread::yield_now();
        };
        let WorkerEvent::DeliverFrame(delivery) = event else {
            panic!("expected a frame");
        };
        assert_eq!(delivery.audio_buffer.len(), 735);
        assert_eq!(delivery.panels.len(), 1);
        assert_eq!(delivery.panels[0].image_buffer[3], 0xFF);

        drop(port);
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn battery_flag_controls_sram() {
        let (port, _inbox, endpoint) = worker_channel();
        let _handle = spawn(endpoint, fast_profile()).unwrap();
        let rpc = RpcChannel::new(port);

        rpc.load_cartridge(vec![0, 1, 2]).await.unwrap();
        assert!(!rpc.has_sram().await.unwrap());

        rpc.load_cartridge(vec![1, 1, 2]).await.unwrap();
        assert!(rpc.has_sram().await.unwrap());
        rpc.set_sram(vec![7, 8, 9]).await.unwrap();
        let sram = rpc.get_sram().await.unwrap();
        assert_eq!(sram.len(), SRAM_SIZE);
        assert_eq!(&sram[..3], &[7, 8, 9]);
    }
}
