//! Audio output graphs for modstream.
//!
//! An [`OutputGraph`] owns at most one connected render session and drives
//! its render step, either from a realtime device callback ([`CpalOutput`])
//! or on demand ([`OfflineOutput`]).

mod cpal_backend;
mod node;
mod offline;
mod traits;

pub use cpal_backend::CpalOutput;
pub use node::{render_node, SessionNode};
pub use offline::OfflineOutput;
pub use traits::{AudioError, OutputGraph, DEFAULT_SAMPLE_RATE};
