//! Framepace Core - audio-driven frame pacing for an off-thread emulator
//!
//! The emulator itself runs on a worker thread and is reached only through
//! message channels. This crate decides when to ask it for the next frame,
//! routes what comes back to the audio and display hosts, and adapts a
//! frameskip level to how well audio keeps up.
//!
//! # Architecture
//!
//! - [`PacingEngine`] - Pacing loop, delivery dispatcher, trouble detector
//!   and frameskip controller for one session
//! - [`Frontend`] - Binds an engine to its worker, audio and render hosts
//! - [`RpcChannel`] - Awaitable calls across the worker boundary
//! - [`CartridgeManager`] - Cartridge checksum and save-RAM persistence

pub mod audio;
pub mod cartridge;
pub mod checksum;
pub mod config;
pub mod engine;
pub mod frame_ring;
pub mod frameskip;
pub mod presentation;
pub mod rpc;
pub mod runner;
pub mod save_store;
#[cfg(test)]
pub mod test_utils;
pub mod trouble;
pub mod worker;

pub use audio::{AudioSink, DEFAULT_SAMPLE_RATE, NullAudio};
pub use cartridge::{AUTOSAVE_PERIOD, CartridgeManager, spawn_autosave};
pub use checksum::{crc32, storage_key};
pub use config::{AudioConfig, Config, ConfigError, StorageConfig};
pub use engine::{
    AudioDisposition, PacingConfig, PacingEngine, PacingMetrics, RequestKind, RunStatus,
    TickOutcome,
};
pub use frame_ring::{FrameBuffer, FrameRing};
pub use frameskip::{FrameskipChange, FrameskipConfig, FrameskipController, ProfilingResults};
pub use presentation::{PresentationQueue, PresentedFrame, RenderHost};
pub use rpc::{RpcChannel, RpcError};
pub use runner::{Frontend, PumpReport};
pub use save_store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use trouble::TroubleDetector;
pub use worker::{
    WorkerCommand, WorkerEndpoint, WorkerEvent, WorkerGone, WorkerInbox, WorkerPort,
    worker_channel,
};

// Re-export shared wire types for convenience
pub use framepace_shared as shared;
