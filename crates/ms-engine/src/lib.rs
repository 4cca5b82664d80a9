//! Chunked render pipeline for modstream.
//!
//! A [`RenderSession`] pulls fixed-size stereo blocks out of a
//! [`DecodeEngine`] into whatever buffer the host audio callback hands it,
//! and turns the continuous stream into discrete [`PlayerEvent`]s.

#[cfg(all(test, debug_assertions))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

mod decode;
mod frame;
mod scratch;
mod session;
mod sink;
mod timing;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use decode::{DecodeEngine, SharedEngine};
pub use frame::{fill_silence, Frame};
pub use scratch::ScratchBuffers;
pub use session::{CleanupReport, RenderSession, RenderStatus, MAX_FRAMES_PER_CHUNK};
pub use sink::{EventSink, NullSink};
pub use timing::RenderTiming;

// Re-export the shared types so backends only need this crate.
pub use ms_ir::{ErrorSource, ModuleHandle, PlaybackState, PlayerEvent, RenderParam, Status};
