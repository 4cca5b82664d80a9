//! Output graph trait and error types.

use std::sync::Arc;

use ms_engine::EventSink;
use thiserror::Error;

use crate::node::SessionNode;

/// Sample rate reported before a device has been opened.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device
    #[error("Device init error: {0}")]
    DeviceInit(String),
    /// Failed to create audio stream
    #[error("Stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("Playback error: {0}")]
    Playback(String),
    /// No audio device available
    #[error("No audio device available")]
    NoDevice,
    /// Output used before it was unlocked
    #[error("Output is not unlocked")]
    Locked,
}

/// Where render sessions get connected.
///
/// A graph holds at most one session. Connecting a new one drops the
/// previous connection.
pub trait OutputGraph {
    /// Current output sample rate.
    fn sample_rate(&self) -> u32;

    /// Whether [`OutputGraph::unlock`] has succeeded.
    fn is_unlocked(&self) -> bool;

    /// Prepare the output for playback (open the device, start the stream).
    fn unlock(&mut self) -> Result<(), AudioError>;

    /// Wire `node` in; its render step is driven from now on.
    fn connect(&mut self, node: SessionNode) -> Result<(), AudioError>;

    /// Drop the current connection, if any.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Where to report output failures. Ignored by graphs that cannot fail.
    fn set_event_sink(&mut self, _sink: Arc<dyn EventSink>) {}
}
