//! Event delivery out of the render step.

use ms_ir::PlayerEvent;

/// Receives events detected during a render callback.
///
/// Called synchronously on the render thread. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PlayerEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PlayerEvent) {}
}
