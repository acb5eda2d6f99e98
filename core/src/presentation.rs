//! Presentation queue
//!
//! Completed frames wait here for the next display refresh. The queue is
//! bounded and drops its oldest entry on overflow: presentation favors
//! freshness over completeness.

use std::collections::VecDeque;

use framepace_shared::PanelId;

/// Frames kept waiting for display in the reference sizing
pub const DEFAULT_PRESENTATION_CAPACITY: usize = 3;

/// Paints pixel buffers onto named surfaces
pub trait RenderHost {
    /// Paint RGBA pixels (4 bytes per pixel, non-premultiplied, no smoothing)
    fn paint(&mut self, target: &str, pixels: &[u8], width: u32, height: u32);
}

/// Where one rendered panel lives and where it should be painted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedPanel {
    pub id: PanelId,
    pub target: String,
    pub width: u32,
    pub height: u32,
    /// Ring slot holding the pixels
    pub slot: usize,
}

/// All panels rendered for one emulated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedFrame {
    pub panels: Vec<PresentedPanel>,
}

/// Bounded FIFO of frames awaiting presentation
#[derive(Debug)]
pub struct PresentationQueue {
    frames: VecDeque<PresentedFrame>,
    capacity: usize,
    dropped: u64,
}

impl PresentationQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity + 1),
            capacity,
            dropped: 0,
        }
    }

    /// Queue a frame, dropping the oldest one if over capacity
    pub fn push(&mut self, frame: PresentedFrame) -> Option<PresentedFrame> {
        self.frames.push_back(frame);
        if self.frames.len() > self.capacity {
            self.dropped += 1;
            tracing::trace!("presentation running behind, dropping oldest frame");
            return self.frames.pop_front();
        }
        None
    }

    pub fn pop(&mut self) -> Option<PresentedFrame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames discarded because presentation fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for PresentationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_PRESENTATION_CAPACITY)
    }
}
