//! Headless playback controller for modstream.
//!
//! Provides one API for loading module sources, driving a single render
//! session through an output graph, querying the decode engine and
//! dispatching named events, shared by the CLI and tests.

mod config;
mod error;
mod events;
mod source;
mod wav;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ms_audio::{OfflineOutput, OutputGraph, SessionNode};
use ms_engine::{DecodeEngine, ModuleHandle, RenderSession, SharedEngine};
use parking_lot::Mutex;

// Re-export common types so callers don't need the lower crates directly.
pub use config::{ConfigError, PlayerConfig};
pub use error::{PlayError, StartError};
pub use events::EventRegistry;
pub use ms_engine::{ErrorSource, Frame, PlayerEvent};
pub use ms_ir::{EventName, ParseEventNameError};
pub use source::{fetch, LoadError, Source};
pub use wav::{frames_to_wav, write_wav};

/// Callback size used when rendering offline.
const OFFLINE_BLOCK_FRAMES: usize = 1024;

/// Owns the output graph, the event registry and at most one active session.
pub struct PlaybackController<G: OutputGraph> {
    engine: SharedEngine,
    output: G,
    config: PlayerConfig,
    events: Arc<EventRegistry>,
    session: Option<SessionNode>,
}

impl<G: OutputGraph> PlaybackController<G> {
    pub fn new(engine: SharedEngine, mut output: G, config: PlayerConfig) -> Self {
        let events = Arc::new(EventRegistry::new());
        output.set_event_sink(events.clone());
        Self {
            engine,
            output,
            config,
            events,
            session: None,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Replace the configuration used by the next `play`.
    pub fn set_config(&mut self, config: PlayerConfig) {
        self.config = config;
    }

    pub fn output(&self) -> &G {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut G {
        &mut self.output
    }

    // --- Acquisition ---

    /// Unlock the output if needed, then resolve `source` to bytes.
    ///
    /// Never touches the current session.
    pub async fn load(&mut self, source: Source) -> Result<Vec<u8>, LoadError> {
        self.ensure_unlocked();
        tracing::info!(%source, "loading module");
        let bytes = source::fetch(source).await?;
        tracing::debug!(bytes = bytes.len(), "module loaded");
        Ok(bytes)
    }

    /// [`PlaybackController::load`] followed by [`PlaybackController::play`].
    pub async fn load_and_play(&mut self, source: Source) -> Result<(), StartError> {
        let bytes = self.load(source).await?;
        self.play(&bytes)?;
        Ok(())
    }

    fn ensure_unlocked(&mut self) {
        if self.output.is_unlocked() {
            return;
        }
        match self.output.unlock() {
            Ok(()) => tracing::debug!("output unlocked"),
            Err(e) => tracing::warn!("failed to unlock output: {}", e),
        }
    }

    // --- Transport ---

    /// Replace the active session with a new one playing `bytes`.
    ///
    /// On failure no session is active afterwards.
    pub fn play(&mut self, bytes: &[u8]) -> Result<(), PlayError> {
        self.stop();

        let Some(mut session) = RenderSession::open(self.engine.clone(), bytes, self.events.clone())
        else {
            tracing::warn!(bytes = bytes.len(), "decode engine rejected module");
            self.events.fire(&PlayerEvent::Error {
                source: ErrorSource::DecodeEngine,
            });
            return Err(PlayError::Rejected);
        };
        self.configure(&mut session);

        let node: SessionNode = Arc::new(Mutex::new(session));
        if let Err(e) = self.output.connect(node.clone()) {
            node.lock().stop();
            return Err(e.into());
        }

        tracing::info!(
            duration = node.lock().query(|e, h| e.duration_seconds(h)),
            sample_rate = self.output.sample_rate(),
            "playing"
        );
        self.session = Some(node);
        Ok(())
    }

    fn configure(&self, session: &mut RenderSession) {
        let config = &self.config;
        session.query_mut(|engine, handle| {
            engine.set_repeat_count(handle, config.repeat_count);
            for param in config.render_params() {
                engine.set_render_param(handle, param);
            }
        });
    }

    /// Tear down the active session. No-op when nothing is playing.
    pub fn stop(&mut self) {
        let Some(node) = self.session.take() else {
            return;
        };
        self.output.disconnect();
        let report = node.lock().stop();
        tracing::debug!(?report, "session stopped");
    }

    /// Flip pause on the active session. Returns whether it is now paused.
    pub fn toggle_pause(&mut self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|node| node.lock().toggle_pause())
    }

    pub fn pause(&mut self) {
        if let Some(node) = &self.session {
            node.lock().pause();
        }
    }

    pub fn unpause(&mut self) {
        if let Some(node) = &self.session {
            node.lock().unpause();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|node| node.lock().is_paused())
    }

    /// A session exists and has not ended.
    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|node| !node.lock().is_ended())
    }

    /// The last session ended on its own (end of stream or error).
    pub fn is_finished(&self) -> bool {
        self.session.as_ref().is_some_and(|node| node.lock().is_ended())
    }

    // --- Queries (defaults when nothing is active) ---

    fn query<T: Default>(&self, f: impl FnOnce(&(dyn DecodeEngine + Send), ModuleHandle) -> T) -> T {
        match &self.session {
            Some(node) => node.lock().query(f),
            None => T::default(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.query(|e, h| e.duration_seconds(h))
    }

    pub fn position(&self) -> f64 {
        self.query(|e, h| e.position_seconds(h))
    }

    pub fn seek(&mut self, seconds: f64) {
        if let Some(node) = &self.session {
            node.lock()
                .query_mut(|e, h| e.set_position_seconds(h, seconds));
        }
    }

    pub fn current_order(&self) -> i32 {
        self.query(|e, h| e.current_order(h))
    }

    pub fn current_pattern(&self) -> i32 {
        self.query(|e, h| e.current_pattern(h))
    }

    pub fn current_row(&self) -> i32 {
        self.query(|e, h| e.current_row(h))
    }

    pub fn total_orders(&self) -> i32 {
        self.query(|e, h| e.num_orders(h))
    }

    pub fn total_patterns(&self) -> i32 {
        self.query(|e, h| e.num_patterns(h))
    }

    pub fn current_speed(&self) -> i32 {
        self.query(|e, h| e.current_speed(h))
    }

    pub fn current_tempo(&self) -> i32 {
        self.query(|e, h| e.current_tempo(h))
    }

    /// Every metadata key the engine reports, with its value.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        self.query(|e, h| {
            e.metadata_keys(h)
                .split(';')
                .filter(|key| !key.is_empty())
                .map(|key| (key.to_string(), e.metadata(h, key)))
                .collect()
        })
    }

    pub fn format_pattern_row_channel(&self, pattern: i32, row: i32, channel: i32) -> String {
        self.query(|e, h| e.format_pattern_row_channel(h, pattern, row, channel))
    }

    pub fn current_render_time(&self) -> Duration {
        self.session
            .as_ref()
            .map(|node| node.lock().current_render_time())
            .unwrap_or_default()
    }

    /// Worst render callback since the previous call.
    pub fn take_max_render_time(&self) -> Duration {
        self.session
            .as_ref()
            .map(|node| node.lock().take_max_render_time())
            .unwrap_or_default()
    }

    // --- Events ---

    pub fn events(&self) -> Arc<EventRegistry> {
        self.events.clone()
    }

    /// Register `handler` under one of `onEnded`, `onError`, `onRowChange`
    /// or `onPatternChange`.
    ///
    /// Handlers run on the render thread while the session lock is held.
    /// Calling any controller query or transport method from a handler
    /// deadlocks, since that lock is not reentrant; forward the event to
    /// another thread (a channel, say) and act on it there.
    pub fn on<F>(&self, name: &str, handler: F) -> Result<(), ParseEventNameError>
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let name: EventName = name.parse()?;
        self.events.on(name, handler);
        Ok(())
    }

    /// Dispatch `event` to every handler registered under its name.
    pub fn fire_event(&self, event: &PlayerEvent) {
        self.events.fire(event);
    }
}

impl PlaybackController<OfflineOutput> {
    /// Pull the active session until it ends or `max_frames` are rendered.
    pub fn render_frames(&mut self, max_frames: usize) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(max_frames);
        while frames.len() < max_frames && self.output.is_connected() {
            let block = OFFLINE_BLOCK_FRAMES.min(max_frames - frames.len());
            frames.extend_from_slice(self.output.pull(block));
        }
        frames
    }

    /// Render at most `max_seconds` of the active session to WAV bytes.
    pub fn render_to_wav(&mut self, max_seconds: u32) -> Vec<u8> {
        let sample_rate = self.output.sample_rate();
        let frames = self.render_frames(sample_rate as usize * max_seconds as usize);
        frames_to_wav(&frames, sample_rate)
    }
}

impl<G: OutputGraph> Drop for PlaybackController<G> {
    fn drop(&mut self) {
        self.stop();
    }
}
