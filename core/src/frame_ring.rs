//! Frame buffer ring
//!
//! A fixed pool of pixel buffers that are lent to the worker for rendering and
//! handed back once filled, so steady-state pacing never allocates.
//!
//! Each slot is an `Option<Vec<u8>>`: `Some` while the ring holds the buffer
//! (free, or filled and waiting to be presented), `None` while the worker
//! owns it. Buffers move by value, so a slot can never be aliased.

use framepace_shared::PanelId;

/// Number of buffers per ring in the reference sizing
pub const DEFAULT_RING_CAPACITY: usize = 16;

/// A buffer lent out of a [`FrameRing`]
#[derive(Debug)]
pub struct FrameBuffer {
    /// Slot the buffer was taken from
    pub slot: usize,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

/// Ring of reusable buffers for one output panel
pub struct FrameRing {
    panel: PanelId,
    slots: Vec<Option<Vec<u8>>>,
    buffer_len: usize,
    write_cursor: usize,
    read_cursor: usize,
}

impl FrameRing {
    /// Create a ring with `capacity` zeroed buffers of `buffer_len` bytes
    pub fn new(panel: PanelId, capacity: usize, buffer_len: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = (0..capacity).map(|_| Some(vec![0u8; buffer_len])).collect();
        Self {
            panel,
            slots,
            buffer_len,
            write_cursor: 0,
            read_cursor: 0,
        }
    }

    /// Create a ring sized for the panel's native resolution
    pub fn for_panel(panel: PanelId, capacity: usize) -> Self {
        Self::new(panel, capacity, panel.buffer_len())
    }

    pub fn panel(&self) -> PanelId {
        self.panel
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    /// Number of buffers currently held by the ring
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Take the buffer at the write cursor and advance it.
    ///
    /// If the worker still holds that slot (the write cursor lapped the
    /// read cursor), a fresh buffer is allocated instead.
    pub fn acquire_write_slot(&mut self) -> FrameBuffer {
        let slot = self.write_cursor;
        self.write_cursor = (self.write_cursor + 1) % self.slots.len();

        let data = self.slots[slot].take().unwrap_or_else(|| {
            tracing::warn!(
                panel = %self.panel,
                slot,
                "frame ring lapped, allocating new buffer"
            );
            vec![0u8; self.buffer_len]
        });
        FrameBuffer { slot, data }
    }

    /// Store a filled buffer at the read cursor and advance it.
    ///
    /// Returns the slot the buffer now lives in.
    pub fn return_filled(&mut self, buffer: Vec<u8>) -> usize {
        let slot = self.read_cursor;
        self.slots[slot] = Some(buffer);
        self.read_cursor = (self.read_cursor + 1) % self.slots.len();
        slot
    }

    /// Borrow the buffer held in `slot`, if the ring currently owns it
    pub fn filled(&self, slot: usize) -> Option<&[u8]> {
        self.slots.get(slot).and_then(|s| s.as_deref())
    }
}
