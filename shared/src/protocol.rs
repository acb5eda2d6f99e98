//! Messages exchanged with the emulation worker.
//!
//! Only the shape of frame/audio delivery and the remote call envelope is
//! defined here; the emulation instruction set behind it is opaque.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width of the primary video panel in pixels
pub const SCREEN_WIDTH: u32 = 256;
/// Height of the primary video panel in pixels
pub const SCREEN_HEIGHT: u32 = 240;
/// Width of the piano roll visualization panel in pixels
pub const PIANO_ROLL_WIDTH: u32 = 480;
/// Height of the piano roll visualization panel in pixels
pub const PIANO_ROLL_HEIGHT: u32 = 270;
/// Pixel format: RGBA, 4 bytes per pixel, non-premultiplied
pub const BYTES_PER_PIXEL: usize = 4;

// ============================================================================
// Panels
// ============================================================================

/// Output panels the worker can render into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelId {
    /// Primary game video
    Screen,
    /// Secondary audio visualization panel
    #[serde(rename = "piano_roll_window")]
    PianoRoll,
}

impl PanelId {
    pub const ALL: [PanelId; 2] = [PanelId::Screen, PanelId::PianoRoll];

    pub fn as_str(self) -> &'static str {
        match self {
            PanelId::Screen => "screen",
            PanelId::PianoRoll => "piano_roll_window",
        }
    }

    /// Native panel size in pixels
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            PanelId::Screen => (SCREEN_WIDTH, SCREEN_HEIGHT),
            PanelId::PianoRoll => (PIANO_ROLL_WIDTH, PIANO_ROLL_HEIGHT),
        }
    }

    /// Byte size of one full panel buffer
    pub fn buffer_len(self) -> usize {
        let (w, h) = self.dimensions();
        w as usize * h as usize * BYTES_PER_PIXEL
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One panel the worker should render, with the buffer to render into.
///
/// The buffer is moved to the worker and comes back inside a
/// [`DeliveredPanel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelRequest {
    pub id: PanelId,
    /// Name of the destination surface the host paints to
    pub target: String,
    pub dest_buffer: Vec<u8>,
}

/// Request to advance emulation by one frame.
///
/// An empty `panels` list is a silent request: emulation advances and audio
/// is produced, but nothing is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRequest {
    pub p1: u8,
    pub p2: u8,
    pub panels: Vec<PanelRequest>,
}

impl FrameRequest {
    pub fn is_silent(&self) -> bool {
        self.panels.is_empty()
    }
}

/// A panel the worker finished rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredPanel {
    pub id: PanelId,
    pub target: String,
    pub width: u32,
    pub height: u32,
    pub image_buffer: Vec<u8>,
}

/// Result of one [`FrameRequest`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDelivery {
    pub panels: Vec<DeliveredPanel>,
    /// Mono samples produced while emulating this frame
    pub audio_buffer: Vec<f32>,
}

/// Rolling average duration of a named piece of worker activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub event_name: String,
    /// Average duration in milliseconds
    pub average_duration: f64,
}

// ============================================================================
// Remote calls
// ============================================================================

/// Argument or result value of a remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RpcValue {
    Unit,
    Bool(bool),
    Bytes(Vec<u8>),
}

/// A named call into the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcCall {
    pub func: String,
    pub args: Vec<RpcValue>,
}

/// Reply to an [`RpcCall`]: either a result payload or an error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcReply {
    Result(RpcValue),
    Error(String),
}

// ============================================================================
// Audio host
// ============================================================================

/// Notification from the audio output device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "count", rename_all = "snake_case")]
pub enum AudioEvent {
    /// Samples consumed by the device
    Played(u32),
    /// Samples the device asked for but were not buffered
    Underrun(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_ids_use_surface_names() {
        assert_eq!(PanelId::Screen.as_str(), "screen");
        assert_eq!(PanelId::PianoRoll.to_string(), "piano_roll_window");
        assert_eq!(
            serde_json::to_string(&PanelId::PianoRoll).unwrap(),
            "\"piano_roll_window\""
        );
    }

    #[test]
    fn panel_buffer_sizes() {
        assert_eq!(PanelId::Screen.buffer_len(), 256 * 240 * 4);
        assert_eq!(PanelId::PianoRoll.buffer_len(), 480 * 270 * 4);
    }

    #[test]
    fn silent_request_has_no_panels() {
        let request = FrameRequest {
            p1: 0x08,
            p2: 0,
            panels: Vec::new(),
        };
        assert!(request.is_silent());
    }

    #[test]
    fn rpc_reply_json_shape() {
        let reply = RpcReply::Result(RpcValue::Bool(true));
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"result":{"type":"bool","value":true}}"#);

        let err: RpcReply = serde_json::from_str(r#"{"error":"no cartridge"}"#).unwrap();
        assert_eq!(err, RpcReply::Error("no cartridge".into()));
    }

    #[test]
    fn audio_event_json_shape() {
        let json = serde_json::to_string(&AudioEvent::Underrun(128)).unwrap();
        assert_eq!(json, r#"{"type":"underrun","count":128}"#);
    }
}
