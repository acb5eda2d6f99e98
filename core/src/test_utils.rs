//! Shared test utilities for unit tests

use std::sync::mpsc::TryRecvError;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use framepace_shared::{DeliveredPanel, FrameDelivery, FrameRequest, RpcReply, RpcValue};

use crate::audio::AudioSink;
use crate::presentation::RenderHost;
use crate::worker::{WorkerCommand, WorkerEndpoint, WorkerEvent};

// ============================================================================
// Host doubles
// ============================================================================

/// Audio sink that records everything it is given
#[derive(Debug, Default)]
pub struct RecordingAudio {
    pub samples: Vec<f32>,
    pub batches: usize,
    pub volume: Option<f32>,
    pub resumed: u32,
    pub suspended: u32,
}

impl AudioSink for RecordingAudio {
    fn queue_samples(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
        self.batches += 1;
    }
    fn set_volume(&mut self, volume: f32) {
        self.volume = Some(volume);
    }
    fn resume(&mut self) {
        self.resumed += 1;
    }
    fn suspend(&mut self) {
        self.suspended += 1;
    }
}

/// One call to [`RenderHost::paint`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paint {
    pub target: String,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Render host that records every paint
#[derive(Debug, Default)]
pub struct RecordingRender {
    pub paints: Vec<Paint>,
}

impl RenderHost for RecordingRender {
    fn paint(&mut self, target: &str, pixels: &[u8], width: u32, height: u32) {
        self.paints.push(Paint {
            target: target.to_string(),
            pixels: pixels.to_vec(),
            width,
            height,
        });
    }
}

// ============================================================================
// Worker doubles
// ============================================================================

/// Take every frame request currently queued on the worker side
pub fn drain_requests(endpoint: &WorkerEndpoint) -> Vec<FrameRequest> {
    let mut requests = Vec::new();
    loop {
        match endpoint.commands.try_recv() {
            Ok(WorkerCommand::RequestFrame(request)) => requests.push(request),
            Ok(WorkerCommand::Rpc { .. }) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    requests
}

/// Render a request by filling each panel with `fill`, producing `samples`
/// audio samples
pub fn render_request(request: FrameRequest, fill: u8, samples: usize) -> FrameDelivery {
    let panels = request
        .panels
        .into_iter()
        .map(|panel| {
            let (width, height) = panel.id.dimensions();
            let mut image_buffer = panel.dest_buffer;
            image_buffer.fill(fill);
            DeliveredPanel {
                id: panel.id,
                target: panel.target,
                width,
                height,
                image_buffer,
            }
        })
        .collect();
    FrameDelivery {
        panels,
        audio_buffer: vec![0.0; samples],
    }
}

/// Worker thread that answers save-RAM calls from an in-memory buffer.
///
/// Frame requests are rendered and delivered immediately with `samples`
/// samples each.
pub struct FakeWorker {
    pub sram: Arc<Mutex<Option<Vec<u8>>>>,
    pub loaded: Arc<Mutex<Vec<Vec<u8>>>>,
    pub handle: JoinHandle<()>,
}

impl FakeWorker {
    pub fn spawn(endpoint: WorkerEndpoint, has_sram: bool, samples: usize) -> Self {
        let sram: Arc<Mutex<Option<Vec<u8>>>> =
            Arc::new(Mutex::new(has_sram.then(|| vec![0u8; 8])));
        let loaded = Arc::new(Mutex::new(Vec::new()));
        let sram_worker = sram.clone();
        let loaded_worker = loaded.clone();

        let handle = thread::spawn(move || {
            while let Ok(command) = endpoint.commands.recv() {
                match command {
                    WorkerCommand::RequestFrame(request) => {
                        let delivery = render_request(request, 0x7F, samples);
                        if endpoint
                            .events
                            .send(WorkerEvent::DeliverFrame(delivery))
                            .is_err()
                        {
                            break;
                        }
                    }
                    WorkerCommand::Rpc { call, reply } => {
                        let mut sram = sram_worker.lock().unwrap();
                        let result = match (call.func.as_str(), call.args.first()) {
                            ("has_sram", _) => RpcReply::Result(RpcValue::Bool(sram.is_some())),
                            ("get_sram", _) => match sram.as_ref() {
                                Some(bytes) => RpcReply::Result(RpcValue::Bytes(bytes.clone())),
                                None => RpcReply::Error("cartridge has no sram".into()),
                            },
                            ("set_sram", Some(RpcValue::Bytes(bytes))) => {
                                *sram = Some(bytes.clone());
                                RpcReply::Result(RpcValue::Unit)
                            }
                            ("load_cartridge", Some(RpcValue::Bytes(bytes))) => {
                                loaded_worker.lock().unwrap().push(bytes.clone());
                                RpcReply::Result(RpcValue::Unit)
                            }
                            (func, _) => RpcReply::Error(format!("unknown call {func}")),
                        };
                        let _ = reply.send(result);
                    }
                }
            }
        });

        Self {
            sram,
            loaded,
            handle,
        }
    }

    /// Overwrite the worker's current save-RAM
    pub fn set_sram(&self, bytes: Vec<u8>) {
        *self.sram.lock().unwrap() = Some(bytes);
    }

    pub fn sram(&self) -> Option<Vec<u8>> {
        self.sram.lock().unwrap().clone()
    }
}
