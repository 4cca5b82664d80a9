//! Capability interface to a module decode engine.

use ms_ir::{ModuleHandle, RenderParam};
use parking_lot::Mutex;
use std::sync::Arc;

/// A decode engine shared between the control thread and the render thread.
pub type SharedEngine = Arc<Mutex<dyn DecodeEngine + Send>>;

/// A tracked-music decode engine addressed through module handles.
///
/// Every handle-keyed call must tolerate a handle the engine no longer
/// knows about and return its default (0, empty string, no-op) instead of
/// panicking.
pub trait DecodeEngine {
    /// Parse raw module bytes. `None` when the input is not a module.
    fn create(&mut self, bytes: &[u8]) -> Option<ModuleHandle>;

    /// Release a module. Unknown handles are ignored.
    fn destroy(&mut self, handle: ModuleHandle);

    /// Whether the module behind `handle` is still loaded. An engine that
    /// tears a module down on its own reports `false` from then on.
    fn is_live(&self, handle: ModuleHandle) -> bool;

    /// Render up to `max_frames` frames into `left`/`right`.
    ///
    /// Returns the number of frames actually produced; 0 means end of stream.
    fn read_stereo(
        &mut self,
        handle: ModuleHandle,
        sample_rate: u32,
        max_frames: usize,
        left: &mut [f32],
        right: &mut [f32],
    ) -> usize;

    fn current_pattern(&self, handle: ModuleHandle) -> i32;
    fn current_row(&self, handle: ModuleHandle) -> i32;
    fn current_order(&self, handle: ModuleHandle) -> i32;
    fn current_speed(&self, handle: ModuleHandle) -> i32;
    fn current_tempo(&self, handle: ModuleHandle) -> i32;
    fn num_patterns(&self, handle: ModuleHandle) -> i32;
    fn num_orders(&self, handle: ModuleHandle) -> i32;

    fn position_seconds(&self, handle: ModuleHandle) -> f64;
    fn duration_seconds(&self, handle: ModuleHandle) -> f64;
    fn set_position_seconds(&mut self, handle: ModuleHandle, seconds: f64);

    /// -1 repeats forever, 0 plays once, `n` plays `n` extra passes.
    fn set_repeat_count(&mut self, handle: ModuleHandle, count: i32);
    fn set_render_param(&mut self, handle: ModuleHandle, param: RenderParam);

    /// Semicolon-joined list of metadata keys.
    fn metadata_keys(&self, handle: ModuleHandle) -> String;
    fn metadata(&self, handle: ModuleHandle, key: &str) -> String;

    fn format_pattern_row_channel(
        &self,
        handle: ModuleHandle,
        pattern: i32,
        row: i32,
        channel: i32,
    ) -> String;
}
