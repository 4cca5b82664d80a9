//! The session slot shared between a graph and its render callback.

use std::sync::Arc;

use ms_engine::{fill_silence, Frame, RenderSession, RenderStatus};
use parking_lot::Mutex;

/// A render session as held by an output graph.
pub type SessionNode = Arc<Mutex<RenderSession>>;

/// Run one render callback against whatever is connected in `slot`.
///
/// Renders silence when nothing is connected or when the control thread
/// holds the session lock. A session reporting [`RenderStatus::Terminated`]
/// is removed from the slot. Returns the session's status, if it ran.
pub fn render_node(
    slot: &mut Option<SessionNode>,
    dest: &mut [Frame],
    sample_rate: u32,
) -> Option<RenderStatus> {
    let status = match slot.as_ref().map(|node| node.try_lock()) {
        Some(Some(mut session)) => {
            let status = session.render(dest, sample_rate);
            if status == RenderStatus::Terminated {
                // Still under the render lock; the audio thread never waits on it.
                session.mark_disconnected();
            }
            Some(status)
        }
        Some(None) | None => {
            fill_silence(dest);
            None
        }
    };

    if status == Some(RenderStatus::Terminated) {
        slot.take();
    }
    status
}
