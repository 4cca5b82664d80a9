//! Core playback state and event types for modstream.
//!
//! These types are shared by the render pipeline, the decode engines and
//! the controller. Nothing here allocates, so the crate stays `no_std`
//! compatible for the realtime side.

#![cfg_attr(not(feature = "std"), no_std)]

mod event;
mod handle;
mod position;
mod render_param;
mod state;

pub use event::{ErrorSource, EventName, ParseEventNameError, PlayerEvent};
pub use handle::ModuleHandle;
pub use position::{PositionMarkers, NO_PATTERN};
pub use render_param::RenderParam;
pub use state::{PlaybackState, Status};
