//! [`DecodeEngine`] implementation backed by [`Player`].

use ms_engine::{DecodeEngine, ModuleHandle, RenderParam};
use slotmap::{new_key_type, Key, KeyData, SlotMap};

use crate::mod_format::load_mod;
use crate::player::Player;

new_key_type! {
    /// Key of a loaded module inside a [`TrackerEngine`].
    pub struct ModuleKey;
}

/// The built-in MOD decode engine.
///
/// Handles are slotmap keys, so a destroyed handle never aliases a module
/// loaded later.
#[derive(Debug, Default)]
pub struct TrackerEngine {
    modules: SlotMap<ModuleKey, Player>,
}

impl TrackerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of modules currently loaded.
    pub fn loaded(&self) -> usize {
        self.modules.len()
    }

    pub fn player(&self, handle: ModuleHandle) -> Option<&Player> {
        self.modules.get(key_of(handle))
    }

    fn player_mut(&mut self, handle: ModuleHandle) -> Option<&mut Player> {
        self.modules.get_mut(key_of(handle))
    }
}

fn key_of(handle: ModuleHandle) -> ModuleKey {
    ModuleKey::from(KeyData::from_ffi(handle.raw()))
}

fn handle_of(key: ModuleKey) -> ModuleHandle {
    ModuleHandle::from_raw(key.data().as_ffi())
}

impl DecodeEngine for TrackerEngine {
    fn create(&mut self, bytes: &[u8]) -> Option<ModuleHandle> {
        match load_mod(bytes) {
            Ok(module) => {
                let key = self.modules.insert(Player::new(module));
                Some(handle_of(key))
            }
            Err(e) => {
                tracing::warn!(bytes = bytes.len(), "module rejected: {}", e);
                None
            }
        }
    }

    fn destroy(&mut self, handle: ModuleHandle) {
        self.modules.remove(key_of(handle));
    }

    fn is_live(&self, handle: ModuleHandle) -> bool {
        self.modules.contains_key(key_of(handle))
    }

    fn read_stereo(
        &mut self,
        handle: ModuleHandle,
        sample_rate: u32,
        max_frames: usize,
        left: &mut [f32],
        right: &mut [f32],
    ) -> usize {
        let Some(player) = self.player_mut(handle) else {
            return 0;
        };
        let frames = max_frames.min(left.len()).min(right.len());
        player.render(sample_rate, &mut left[..frames], &mut right[..frames])
    }

    fn current_pattern(&self, handle: ModuleHandle) -> i32 {
        self.player(handle).map_or(0, |p| p.current_pattern() as i32)
    }

    fn current_row(&self, handle: ModuleHandle) -> i32 {
        self.player(handle).map_or(0, |p| p.current_row() as i32)
    }

    fn current_order(&self, handle: ModuleHandle) -> i32 {
        self.player(handle).map_or(0, |p| p.current_order() as i32)
    }

    fn current_speed(&self, handle: ModuleHandle) -> i32 {
        self.player(handle).map_or(0, |p| p.current_speed() as i32)
    }

    fn current_tempo(&self, handle: ModuleHandle) -> i32 {
        self.player(handle).map_or(0, |p| p.current_tempo() as i32)
    }

    fn num_patterns(&self, handle: ModuleHandle) -> i32 {
        self.player(handle)
            .map_or(0, |p| p.module().patterns.len() as i32)
    }

    fn num_orders(&self, handle: ModuleHandle) -> i32 {
        self.player(handle).map_or(0, |p| p.module().order.len() as i32)
    }

    fn position_seconds(&self, handle: ModuleHandle) -> f64 {
        self.player(handle).map_or(0.0, Player::position_seconds)
    }

    fn duration_seconds(&self, handle: ModuleHandle) -> f64 {
        self.player(handle).map_or(0.0, Player::duration_seconds)
    }

    fn set_position_seconds(&mut self, handle: ModuleHandle, seconds: f64) {
        if let Some(player) = self.player_mut(handle) {
            player.seek(seconds);
        }
    }

    fn set_repeat_count(&mut self, handle: ModuleHandle, count: i32) {
        if let Some(player) = self.player_mut(handle) {
            player.set_repeat_count(count);
        }
    }

    fn set_render_param(&mut self, handle: ModuleHandle, param: RenderParam) {
        if let Some(player) = self.player_mut(handle) {
            player.set_render_param(param);
        }
    }

    fn metadata_keys(&self, handle: ModuleHandle) -> String {
        self.player(handle)
            .map(|p| p.metadata_keys().to_string())
            .unwrap_or_default()
    }

    fn metadata(&self, handle: ModuleHandle, key: &str) -> String {
        self.player(handle)
            .map(|p| p.metadata(key))
            .unwrap_or_default()
    }

    fn format_pattern_row_channel(
        &self,
        handle: ModuleHandle,
        pattern: i32,
        row: i32,
        channel: i32,
    ) -> String {
        let (Ok(pattern), Ok(row), Ok(channel)) = (
            usize::try_from(pattern),
            usize::try_from(row),
            usize::try_from(channel),
        ) else {
            return String::new();
        };
        self.player(handle)
            .map(|p| p.format_cell(pattern, row, channel))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mod_format::tests::{note, ModBuilder};

    fn engine_with_song() -> (TrackerEngine, ModuleHandle) {
        let mut engine = TrackerEngine::new();
        let data = ModBuilder::new().cell(0, 0, 0, note(428, 1)).build();
        let handle = engine.create(&data).unwrap();
        (engine, handle)
    }

    #[test]
    fn create_rejects_garbage() {
        let mut engine = TrackerEngine::new();
        assert_eq!(engine.create(&[]), None);
        assert_eq!(engine.create(b"definitely not a module"), None);
        assert_eq!(engine.loaded(), 0);
    }

    #[test]
    fn destroyed_handles_answer_defaults() {
        let (mut engine, handle) = engine_with_song();
        assert!(engine.is_live(handle));
        engine.destroy(handle);
        engine.destroy(handle);
        assert!(!engine.is_live(handle));
        assert_eq!(engine.duration_seconds(handle), 0.0);
        assert_eq!(engine.metadata_keys(handle), "");
        assert_eq!(engine.format_pattern_row_channel(handle, 0, 0, 0), "");

        let mut left = [1.0; 16];
        let mut right = [1.0; 16];
        assert_eq!(engine.read_stereo(handle, 44100, 16, &mut left, &mut right), 0);
    }

    #[test]
    fn stale_handle_does_not_alias_new_module() {
        let (mut engine, first) = engine_with_song();
        engine.destroy(first);
        let data = ModBuilder::new().build();
        let second = engine.create(&data).unwrap();
        assert_ne!(first, second);
        assert!(!engine.is_live(first));
        assert!(engine.is_live(second));
    }

    #[test]
    fn read_respects_max_frames() {
        let (mut engine, handle) = engine_with_song();
        let mut left = [0.0; 256];
        let mut right = [0.0; 256];
        assert_eq!(engine.read_stereo(handle, 44100, 100, &mut left, &mut right), 100);
        assert!(left[..100].iter().any(|&s| s != 0.0));
        assert!(left[100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn queries_report_song_layout() {
        let (engine, handle) = engine_with_song();
        assert_eq!(engine.num_orders(handle), 1);
        assert_eq!(engine.num_patterns(handle), 1);
        assert_eq!(engine.current_speed(handle), 6);
        assert_eq!(engine.current_tempo(handle), 125);
        assert_eq!(engine.metadata(handle, "title"), "test song");
        assert_eq!(engine.metadata_keys(handle), "type;type_long;tracker;title;message");
        assert_eq!(engine.format_pattern_row_channel(handle, 0, 0, 0), "C-2 01 ...");
        assert_eq!(engine.format_pattern_row_channel(handle, 0, -1, 0), "");
    }

    #[test]
    fn seek_moves_position() {
        let (mut engine, handle) = engine_with_song();
        engine.set_position_seconds(handle, 1.3);
        assert_eq!(engine.current_row(handle), 10);
        assert!((engine.position_seconds(handle) - 1.2).abs() < 1e-9);
    }
}
