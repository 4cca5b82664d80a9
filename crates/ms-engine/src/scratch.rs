//! Per-session scratch buffers the decode engine renders into.

/// Left/right sample buffers of fixed capacity.
///
/// Each channel is freed independently, and a freed channel stays `None`,
/// so releasing twice is harmless.
#[derive(Debug)]
pub struct ScratchBuffers {
    left: Option<Box<[f32]>>,
    right: Option<Box<[f32]>>,
    capacity: usize,
}

impl ScratchBuffers {
    /// Allocate both channels with `capacity` samples each.
    pub fn new(capacity: usize) -> Self {
        Self {
            left: Some(vec![0.0; capacity].into_boxed_slice()),
            right: Some(vec![0.0; capacity].into_boxed_slice()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Both channels are still allocated.
    pub fn is_allocated(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    /// Borrow both channels, or `None` once either has been freed.
    pub fn channels_mut(&mut self) -> Option<(&mut [f32], &mut [f32])> {
        match (self.left.as_deref_mut(), self.right.as_deref_mut()) {
            (Some(left), Some(right)) => Some((left, right)),
            _ => None,
        }
    }

    /// Free whatever is still allocated, returning how many channels were freed.
    pub fn release(&mut self) -> usize {
        let mut freed = 0;
        if self.left.take().is_some() {
            freed += 1;
        }
        if self.right.take().is_some() {
            freed += 1;
        }
        freed
    }
}
