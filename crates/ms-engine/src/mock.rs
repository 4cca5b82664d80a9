//! Scripted decode engine and recording sink for tests and benches.

use std::collections::BTreeMap;

use ms_ir::{ModuleHandle, PlayerEvent, RenderParam};
use parking_lot::Mutex;

use crate::decode::DecodeEngine;
use crate::frame::Frame;
use crate::sink::EventSink;

/// How every module created by a [`MockEngine`] behaves.
#[derive(Clone, Debug)]
pub struct MockScript {
    /// Frames before end of stream (`None` = endless)
    pub total_frames: Option<usize>,
    /// Cap on frames produced per `read_stereo` call
    pub max_frames_per_read: Option<usize>,
    /// Drop the module inside the engine when it runs out of frames
    pub lose_module_at_end: bool,
    /// Panic inside `read_stereo`
    pub panic_on_read: bool,
    pub duration_seconds: f64,
    pub num_patterns: i32,
    pub num_orders: i32,
    pub metadata: Vec<(String, String)>,
}

impl MockScript {
    /// Value written to every produced frame.
    pub const SAMPLE: Frame = Frame::new(0.5, -0.5);

    pub fn endless() -> Self {
        Self {
            total_frames: None,
            max_frames_per_read: None,
            lose_module_at_end: false,
            panic_on_read: false,
            duration_seconds: 60.0,
            num_patterns: 8,
            num_orders: 12,
            metadata: vec![
                ("title".to_string(), "mock tune".to_string()),
                ("type".to_string(), "mock".to_string()),
            ],
        }
    }
}

impl Default for MockScript {
    fn default() -> Self {
        Self::endless()
    }
}

/// Call counters, for asserting on how a session drove the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MockCalls {
    pub creates: usize,
    pub destroys: usize,
    pub reads: usize,
    pub frames_requested: usize,
    pub last_request: usize,
    pub last_sample_rate: u32,
}

#[derive(Debug)]
struct MockModule {
    remaining: Option<usize>,
    live: bool,
    pattern: i32,
    row: i32,
    order: i32,
    position: f64,
    repeat_count: i32,
    params: Vec<RenderParam>,
}

/// A decode engine driven by a [`MockScript`].
#[derive(Debug, Default)]
pub struct MockEngine {
    script: MockScript,
    modules: BTreeMap<u64, MockModule>,
    next_handle: u64,
    calls: MockCalls,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: MockScript) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> MockCalls {
        self.calls
    }

    /// Number of modules still held by the engine.
    pub fn loaded(&self) -> usize {
        self.modules.len()
    }

    /// Move the reported pattern/row of a module.
    pub fn set_position(&mut self, handle: ModuleHandle, pattern: i32, row: i32) {
        if let Some(module) = self.modules.get_mut(&handle.raw()) {
            module.pattern = pattern;
            module.row = row;
        }
    }

    /// Drop a module inside the engine without going through `destroy`.
    pub fn lose(&mut self, handle: ModuleHandle) {
        if let Some(module) = self.modules.get_mut(&handle.raw()) {
            module.live = false;
        }
    }

    pub fn repeat_count(&self, handle: ModuleHandle) -> Option<i32> {
        self.modules.get(&handle.raw()).map(|m| m.repeat_count)
    }

    pub fn render_params(&self, handle: ModuleHandle) -> Vec<RenderParam> {
        self.modules
            .get(&handle.raw())
            .map(|m| m.params.clone())
            .unwrap_or_default()
    }

    fn live(&self, handle: ModuleHandle) -> Option<&MockModule> {
        self.modules.get(&handle.raw()).filter(|m| m.live)
    }
}

impl DecodeEngine for MockEngine {
    fn create(&mut self, bytes: &[u8]) -> Option<ModuleHandle> {
        self.calls.creates += 1;
        if bytes.is_empty() {
            return None;
        }
        self.next_handle += 1;
        self.modules.insert(
            self.next_handle,
            MockModule {
                remaining: self.script.total_frames,
                live: true,
                pattern: 0,
                row: 0,
                order: 0,
                position: 0.0,
                repeat_count: 0,
                params: Vec::new(),
            },
        );
        Some(ModuleHandle::from_raw(self.next_handle))
    }

    fn destroy(&mut self, handle: ModuleHandle) {
        self.calls.destroys += 1;
        self.modules.remove(&handle.raw());
    }

    fn is_live(&self, handle: ModuleHandle) -> bool {
        self.live(handle).is_some()
    }

    fn read_stereo(
        &mut self,
        handle: ModuleHandle,
        sample_rate: u32,
        max_frames: usize,
        left: &mut [f32],
        right: &mut [f32],
    ) -> usize {
        self.calls.reads += 1;
        self.calls.frames_requested += max_frames;
        self.calls.last_request = max_frames;
        self.calls.last_sample_rate = sample_rate;

        if self.script.panic_on_read {
            panic!("mock engine read failure");
        }

        let cap = self.script.max_frames_per_read;
        let lose_at_end = self.script.lose_module_at_end;
        let Some(module) = self.modules.get_mut(&handle.raw()).filter(|m| m.live) else {
            return 0;
        };

        let mut frames = max_frames.min(left.len()).min(right.len());
        if let Some(cap) = cap {
            frames = frames.min(cap);
        }
        if let Some(remaining) = module.remaining.as_mut() {
            frames = frames.min(*remaining);
            *remaining -= frames;
            if frames == 0 && lose_at_end {
                module.live = false;
            }
        }

        left[..frames].fill(MockScript::SAMPLE.left);
        right[..frames].fill(MockScript::SAMPLE.right);
        if sample_rate > 0 {
            module.position += frames as f64 / sample_rate as f64;
        }
        frames
    }

    fn current_pattern(&self, handle: ModuleHandle) -> i32 {
        self.live(handle).map_or(0, |m| m.pattern)
    }

    fn current_row(&self, handle: ModuleHandle) -> i32 {
        self.live(handle).map_or(0, |m| m.row)
    }

    fn current_order(&self, handle: ModuleHandle) -> i32 {
        self.live(handle).map_or(0, |m| m.order)
    }

    fn current_speed(&self, handle: ModuleHandle) -> i32 {
        self.live(handle).map_or(0, |_| 6)
    }

    fn current_tempo(&self, handle: ModuleHandle) -> i32 {
        self.live(handle).map_or(0, |_| 125)
    }

    fn num_patterns(&self, handle: ModuleHandle) -> i32 {
        self.live(handle).map_or(0, |_| self.script.num_patterns)
    }

    fn num_orders(&self, handle: ModuleHandle) -> i32 {
        self.live(handle).map_or(0, |_| self.script.num_orders)
    }

    fn position_seconds(&self, handle: ModuleHandle) -> f64 {
        self.live(handle).map_or(0.0, |m| m.position)
    }

    fn duration_seconds(&self, handle: ModuleHandle) -> f64 {
        self.live(handle).map_or(0.0, |_| self.script.duration_seconds)
    }

    fn set_position_seconds(&mut self, handle: ModuleHandle, seconds: f64) {
        let duration = self.script.duration_seconds;
        if let Some(module) = self.modules.get_mut(&handle.raw()).filter(|m| m.live) {
            module.position = seconds.clamp(0.0, duration);
        }
    }

    fn set_repeat_count(&mut self, handle: ModuleHandle, count: i32) {
        if let Some(module) = self.modules.get_mut(&handle.raw()) {
            module.repeat_count = count;
        }
    }

    fn set_render_param(&mut self, handle: ModuleHandle, param: RenderParam) {
        if let Some(module) = self.modules.get_mut(&handle.raw()) {
            module.params.push(param);
        }
    }

    fn metadata_keys(&self, handle: ModuleHandle) -> String {
        if self.live(handle).is_none() {
            return String::new();
        }
        self.script
            .metadata
            .iter()
            .map(|(key, _)| key.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }

    fn metadata(&self, handle: ModuleHandle, key: &str) -> String {
        if self.live(handle).is_none() {
            return String::new();
        }
        self.script
            .metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    fn format_pattern_row_channel(
        &self,
        handle: ModuleHandle,
        pattern: i32,
        row: i32,
        channel: i32,
    ) -> String {
        if self.live(handle).is_none() {
            return String::new();
        }
        format!("p{pattern} r{row} c{channel}")
    }
}

/// Sink that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<PlayerEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: PlayerEvent) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PlayerEvent) {
        self.events.lock().push(event);
    }
}
