//! Device-less output graph driven by explicit pulls.

use ms_engine::{Frame, RenderStatus};

use crate::node::{render_node, SessionNode};
use crate::traits::{AudioError, OutputGraph};

/// An output graph with no device behind it.
///
/// Each [`OfflineOutput::pull`] runs the connected session's render step
/// exactly like a realtime callback would. Used for WAV export and tests.
pub struct OfflineOutput {
    sample_rate: u32,
    unlock_count: usize,
    slot: Option<SessionNode>,
    buffer: Vec<Frame>,
}

impl OfflineOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            unlock_count: 0,
            slot: None,
            buffer: Vec::new(),
        }
    }

    /// How many times the output was actually unlocked (0 or 1).
    pub fn unlock_count(&self) -> usize {
        self.unlock_count
    }

    /// Render one callback of `frames` frames and return the result.
    pub fn pull(&mut self, frames: usize) -> &[Frame] {
        self.buffer.resize(frames, Frame::silence());
        render_node(&mut self.slot, &mut self.buffer, self.sample_rate);
        &self.buffer
    }

    /// Render one callback straight into `dest`.
    pub fn render_into(&mut self, dest: &mut [Frame]) -> Option<RenderStatus> {
        render_node(&mut self.slot, dest, self.sample_rate)
    }

    /// The connected session, if any.
    pub fn node(&self) -> Option<&SessionNode> {
        self.slot.as_ref()
    }
}

impl OutputGraph for OfflineOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_unlocked(&self) -> bool {
        self.unlock_count > 0
    }

    fn unlock(&mut self) -> Result<(), AudioError> {
        if self.unlock_count == 0 {
            self.unlock_count = 1;
        }
        Ok(())
    }

    fn connect(&mut self, node: SessionNode) -> Result<(), AudioError> {
        if self.unlock_count == 0 {
            return Err(AudioError::Locked);
        }
        self.disconnect();
        node.lock().mark_connected();
        self.slot = Some(node);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(node) = self.slot.take() {
            node.lock().mark_disconnected();
        }
    }

    fn is_connected(&self) -> bool {
        self.slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_engine::mock::{MockEngine, MockScript};
    use ms_engine::{NullSink, RenderSession, SharedEngine};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn node() -> SessionNode {
        let engine: SharedEngine = Arc::new(Mutex::new(MockEngine::with_script(MockScript::endless())));
        Arc::new(Mutex::new(
            RenderSession::open(engine, b"mod", Arc::new(NullSink)).unwrap(),
        ))
    }

    #[test]
    fn connect_requires_unlock() {
        let mut output = OfflineOutput::new(48000);
        assert!(matches!(output.connect(node()), Err(AudioError::Locked)));
        output.unlock().unwrap();
        output.unlock().unwrap();
        assert_eq!(output.unlock_count(), 1);
        output.connect(node()).unwrap();
        assert!(output.is_connected());
    }

    #[test]
    fn connecting_replaces_previous_node() {
        let mut output = OfflineOutput::new(48000);
        output.unlock().unwrap();
        let first = node();
        output.connect(first.clone()).unwrap();
        output.connect(node()).unwrap();
        assert!(!first.lock().is_connected());
    }

    #[test]
    fn pull_renders_connected_session() {
        let mut output = OfflineOutput::new(48000);
        output.unlock().unwrap();
        output.connect(node()).unwrap();
        let frames = output.pull(100);
        assert_eq!(frames.len(), 100);
        assert!(frames.iter().all(|f| *f == MockScript::SAMPLE));
    }
}
