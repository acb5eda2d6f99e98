//! Shared types for the framepace front end.
//!
//! Everything that crosses the worker boundary lives here so the emulation
//! worker and the pacing engine agree on message shapes.

pub mod input;
pub mod protocol;

pub use input::{CONTROLLER_COUNT, ControllerButtons, ControllerState};
pub use protocol::{
    AudioEvent, BYTES_PER_PIXEL, DeliveredPanel, FrameDelivery, FrameRequest, PanelId,
    PanelRequest, PerformanceReport, RpcCall, RpcReply, RpcValue,
};
