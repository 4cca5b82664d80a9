//! The chunked render pipeline.
//!
//! One [`RenderSession`] exists per playback. The host audio callback calls
//! [`RenderSession::render`] with a buffer of whatever size it likes; the
//! session fills it in chunks of at most `chunk_size` frames, detects
//! pattern changes and end of stream, and tears itself down when the
//! stream is over.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ms_ir::{ErrorSource, ModuleHandle, PlaybackState, PlayerEvent, PositionMarkers};

use crate::decode::SharedEngine;
use crate::frame::{fill_silence, Frame};
use crate::scratch::ScratchBuffers;
use crate::sink::EventSink;
use crate::timing::RenderTiming;

/// Largest frame count requested from the decode engine in one call.
pub const MAX_FRAMES_PER_CHUNK: usize = 4096;

/// What the graph node should do after a render callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// Keep calling `render`.
    Continue,
    /// The session has torn itself down; disconnect it.
    Terminated,
}

/// Which resources a cleanup call actually released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub handle_destroyed: bool,
    pub buffers_freed: usize,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        !self.handle_destroyed && self.buffers_freed == 0
    }
}

/// How a stream ended inside the chunk loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamEnd {
    /// Zero frames with the module still loaded
    Clean,
    /// Zero frames after the engine dropped the module
    EngineLost,
}

/// A single playback of one module.
pub struct RenderSession {
    engine: SharedEngine,
    handle: Option<ModuleHandle>,
    scratch: ScratchBuffers,
    chunk_size: usize,
    state: PlaybackState,
    markers: PositionMarkers,
    timing: RenderTiming,
    sink: Arc<dyn EventSink>,
    connected: bool,
}

impl RenderSession {
    /// Wrap an already created module handle.
    pub fn new(engine: SharedEngine, handle: ModuleHandle, sink: Arc<dyn EventSink>) -> Self {
        Self::with_chunk_size(engine, handle, sink, MAX_FRAMES_PER_CHUNK)
    }

    /// Like [`RenderSession::new`] with a custom chunk size.
    pub fn with_chunk_size(
        engine: SharedEngine,
        handle: ModuleHandle,
        sink: Arc<dyn EventSink>,
        chunk_size: usize,
    ) -> Self {
        let chunk_size = chunk_size.max(1);
        tracing::debug!(%handle, chunk_size, "render session created");
        Self {
            engine,
            handle: Some(handle),
            scratch: ScratchBuffers::new(chunk_size),
            chunk_size,
            state: PlaybackState::new(),
            markers: PositionMarkers::new(),
            timing: RenderTiming::default(),
            sink,
            connected: false,
        }
    }

    /// Load `bytes` into the engine and build a session around the new module.
    ///
    /// Returns `None` when the engine rejects the data.
    pub fn open(engine: SharedEngine, bytes: &[u8], sink: Arc<dyn EventSink>) -> Option<Self> {
        let handle = engine.lock().create(bytes)?;
        Some(Self::new(engine, handle, sink))
    }

    pub fn handle(&self) -> Option<ModuleHandle> {
        self.handle
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Called by the output graph once the session is wired in.
    pub fn mark_connected(&mut self) {
        self.connected = true;
    }

    /// Called by the output graph when it drops the session.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    pub fn scratch(&self) -> &ScratchBuffers {
        &self.scratch
    }

    pub fn pause(&mut self) {
        self.state.set_paused(true);
    }

    pub fn unpause(&mut self) {
        self.state.set_paused(false);
    }

    /// Flip the pause flag, returning whether the session is now paused.
    pub fn toggle_pause(&mut self) -> bool {
        self.state.toggle_paused()
    }

    /// Duration of the most recent render callback.
    pub fn current_render_time(&self) -> Duration {
        self.timing.current()
    }

    /// Worst render callback since the previous call. Resets the maximum.
    pub fn take_max_render_time(&mut self) -> Duration {
        self.timing.take_max()
    }

    /// Run `f` against the engine with the live handle, or return the default.
    pub fn query<T: Default>(
        &self,
        f: impl FnOnce(&(dyn crate::DecodeEngine + Send), ModuleHandle) -> T,
    ) -> T {
        match self.handle {
            Some(handle) => f(&*self.engine.lock(), handle),
            None => T::default(),
        }
    }

    /// Mutable variant of [`RenderSession::query`].
    pub fn query_mut<T: Default>(
        &mut self,
        f: impl FnOnce(&mut (dyn crate::DecodeEngine + Send), ModuleHandle) -> T,
    ) -> T {
        match self.handle {
            Some(handle) => f(&mut *self.engine.lock(), handle),
            None => T::default(),
        }
    }

    /// Fill `dest` with the next `dest.len()` frames of the stream.
    ///
    /// Never panics: anything the engine does wrong ends up as silence, an
    /// error event and a torn-down session.
    pub fn render(&mut self, dest: &mut [Frame], sample_rate: u32) -> RenderStatus {
        match panic::catch_unwind(AssertUnwindSafe(|| self.render_inner(dest, sample_rate))) {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!("decode engine panicked during render; tearing session down");
                fill_silence(dest);
                // The module is in an unknown state; forget it rather than risk a second panic.
                if let Some(handle) = self.handle.take() {
                    let engine = &self.engine;
                    let _ = panic::catch_unwind(AssertUnwindSafe(|| engine.lock().destroy(handle)));
                }
                self.teardown();
                self.sink.emit(PlayerEvent::Error {
                    source: ErrorSource::DecodeEngine,
                });
                RenderStatus::Terminated
            }
        }
    }

    fn render_inner(&mut self, dest: &mut [Frame], sample_rate: u32) -> RenderStatus {
        let Some(handle) = self.handle else {
            fill_silence(dest);
            self.teardown();
            return RenderStatus::Terminated;
        };

        if self.state.is_paused() {
            fill_silence(dest);
            return RenderStatus::Continue;
        }

        // Once per callback, outside the chunk loop.
        let (pattern, row) = {
            let engine = self.engine.lock();
            (engine.current_pattern(handle), engine.current_row(handle))
        };
        if self.markers.observe(pattern, row) {
            self.sink.emit(PlayerEvent::PatternChange);
        }
        self.sink.emit(PlayerEvent::RowChange { index: row });

        let started = Instant::now();
        let end = self.fill_chunks(handle, dest, sample_rate);

        let status = match end {
            None => RenderStatus::Continue,
            Some(end) => {
                if end == StreamEnd::EngineLost {
                    // Already gone inside the engine; nothing left to destroy.
                    self.handle = None;
                }
                self.teardown();
                let event = match end {
                    StreamEnd::Clean => PlayerEvent::Ended,
                    StreamEnd::EngineLost => PlayerEvent::Error {
                        source: ErrorSource::DecodeEngine,
                    },
                };
                tracing::debug!(%handle, ?event, "stream finished");
                self.sink.emit(event);
                RenderStatus::Terminated
            }
        };

        self.timing.record(started.elapsed());
        status
    }

    /// The chunk loop. Returns how the stream ended, if it did.
    fn fill_chunks(
        &mut self,
        handle: ModuleHandle,
        dest: &mut [Frame],
        sample_rate: u32,
    ) -> Option<StreamEnd> {
        let Some((left, right)) = self.scratch.channels_mut() else {
            // Buffers gone under a live handle: treat as a dead module.
            fill_silence(dest);
            return Some(StreamEnd::EngineLost);
        };

        let mut engine = self.engine.lock();
        let mut end = None;
        let mut offset = 0;
        let mut remaining = dest.len();

        while remaining > 0 {
            let requested = remaining.min(self.chunk_size);
            let chunk = &mut dest[offset..offset + requested];

            let produced = if end.is_none() {
                engine
                    .read_stereo(
                        handle,
                        sample_rate,
                        requested,
                        &mut left[..requested],
                        &mut right[..requested],
                    )
                    .min(requested)
            } else {
                0
            };

            if produced == 0 && end.is_none() {
                end = Some(if engine.is_live(handle) {
                    StreamEnd::Clean
                } else {
                    StreamEnd::EngineLost
                });
            }

            for (frame, (&l, &r)) in chunk.iter_mut().zip(left.iter().zip(right.iter())).take(produced) {
                *frame = Frame::new(l, r);
            }
            fill_silence(&mut chunk[produced..]);

            // Advance by the requested size even on a short read so the loop always terminates.
            offset += requested;
            remaining -= requested;
        }

        end
    }

    /// Disconnect, clean up, and mark the session ended.
    fn teardown(&mut self) {
        self.connected = false;
        self.cleanup();
        self.state.end();
    }

    /// Disconnect and release everything, whatever the current state.
    pub fn stop(&mut self) -> CleanupReport {
        self.connected = false;
        let report = self.cleanup();
        self.state.end();
        report
    }

    /// Destroy the module and free the scratch buffers.
    ///
    /// Each resource is released at most once; later calls report nothing.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if let Some(handle) = self.handle.take() {
            self.engine.lock().destroy(handle);
            report.handle_destroyed = true;
            tracing::debug!(%handle, "module destroyed");
        }
        report.buffers_freed = self.scratch.release();
        report
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("handle", &self.handle)
            .field("chunk_size", &self.chunk_size)
            .field("state", &self.state)
            .field("markers", &self.markers)
            .field("connected", &self.connected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEngine, MockScript, RecordingSink};
    use parking_lot::Mutex;

    const RATE: u32 = 44100;

    fn session_with(script: MockScript, chunk: usize) -> (Arc<Mutex<MockEngine>>, Arc<RecordingSink>, RenderSession) {
        let mock = Arc::new(Mutex::new(MockEngine::with_script(script)));
        let sink = Arc::new(RecordingSink::default());
        let engine: SharedEngine = mock.clone();
        let handle = engine.lock().create(b"module").unwrap();
        let session = RenderSession::with_chunk_size(engine, handle, sink.clone(), chunk);
        (mock, sink, session)
    }

    fn dirty(n: usize) -> Vec<Frame> {
        vec![Frame::mono(9.0); n]
    }

    #[test]
    fn fills_every_frame_of_odd_sized_buffers() {
        for n in [1, 7, 100, 4095, 4096, 4097, 10_000] {
            let (_, _, mut session) = session_with(MockScript::endless(), MAX_FRAMES_PER_CHUNK);
            let mut dest = dirty(n);
            assert_eq!(session.render(&mut dest, RATE), RenderStatus::Continue);
            assert!(dest.iter().all(|f| *f == MockScript::SAMPLE), "n = {}", n);
        }
    }

    #[test]
    fn small_buffer_is_one_chunk_request() {
        let (mock, _, mut session) = session_with(MockScript::endless(), 4096);
        let mut dest = dirty(2048);
        session.render(&mut dest, RATE);
        let calls = mock.lock().calls();
        assert_eq!(calls.reads, 1);
        assert_eq!(calls.last_request, 2048);
    }

    #[test]
    fn large_buffer_is_split_into_chunks() {
        let (mock, _, mut session) = session_with(MockScript::endless(), 4096);
        let mut dest = dirty(10_000);
        session.render(&mut dest, RATE);
        let calls = mock.lock().calls();
        assert_eq!(calls.reads, 3);
        assert_eq!(calls.frames_requested, 10_000);
        assert_eq!(calls.last_request, 10_000 - 2 * 4096);
    }

    #[test]
    fn paused_session_renders_silence_without_decoding() {
        let (mock, sink, mut session) = session_with(MockScript::endless(), 64);
        session.pause();
        let mut dest = dirty(200);
        assert_eq!(session.render(&mut dest, RATE), RenderStatus::Continue);
        assert!(dest.iter().all(Frame::is_silent));
        assert_eq!(mock.lock().calls().reads, 0);
        assert!(sink.events().is_empty());
        assert!(session.handle().is_some());
    }

    #[test]
    fn short_read_zero_fills_rest_of_chunk() {
        let script = MockScript {
            max_frames_per_read: Some(10),
            ..MockScript::endless()
        };
        let (mock, _, mut session) = session_with(script, 64);
        let mut dest = dirty(128);
        assert_eq!(session.render(&mut dest, RATE), RenderStatus::Continue);
        for chunk in dest.chunks(64) {
            assert!(chunk[..10].iter().all(|f| *f == MockScript::SAMPLE));
            assert!(chunk[10..].iter().all(Frame::is_silent));
        }
        assert_eq!(mock.lock().calls().reads, 2);
    }

    #[test]
    fn clean_end_emits_ended_once() {
        let script = MockScript {
            total_frames: Some(100),
            ..MockScript::endless()
        };
        let (mock, sink, mut session) = session_with(script, 64);
        let mut dest = dirty(256);
        assert_eq!(session.render(&mut dest, RATE), RenderStatus::Terminated);

        assert!(dest[..100].iter().all(|f| *f == MockScript::SAMPLE));
        assert!(dest[100..].iter().all(Frame::is_silent));

        let events = sink.events();
        assert_eq!(events.iter().filter(|e| **e == PlayerEvent::Ended).count(), 1);
        assert!(!events.iter().any(|e| matches!(e, PlayerEvent::Error { .. })));

        assert!(session.is_ended());
        assert!(session.handle().is_none());
        assert!(!session.scratch().is_allocated());
        assert_eq!(mock.lock().calls().destroys, 1);
    }

    #[test]
    fn no_decode_after_end_of_stream() {
        let script = MockScript {
            total_frames: Some(10),
            ..MockScript::endless()
        };
        let (mock, _, mut session) = session_with(script, 64);
        let mut dest = dirty(64 * 4);
        session.render(&mut dest, RATE);
        // First chunk short, second chunk hits zero, remaining chunks skip the engine.
        assert_eq!(mock.lock().calls().reads, 2);

        let reads = mock.lock().calls().reads;
        let mut dest = dirty(64);
        assert_eq!(session.render(&mut dest, RATE), RenderStatus::Terminated);
        assert!(dest.iter().all(Frame::is_silent));
        assert_eq!(mock.lock().calls().reads, reads);
    }

    #[test]
    fn engine_teardown_emits_error_instead_of_ended() {
        let script = MockScript {
            total_frames: Some(32),
            lose_module_at_end: true,
            ..MockScript::endless()
        };
        let (mock, sink, mut session) = session_with(script, 64);
        let mut dest = dirty(128);
        assert_eq!(session.render(&mut dest, RATE), RenderStatus::Terminated);

        let events = sink.events();
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == PlayerEvent::Error { source: ErrorSource::DecodeEngine })
                .count(),
            1
        );
        assert!(!events.contains(&PlayerEvent::Ended));
        // The engine already dropped the module, so no destroy call is made.
        assert_eq!(mock.lock().calls().destroys, 0);
    }

    #[test]
    fn render_without_handle_is_silent_teardown() {
        let (_, sink, mut session) = session_with(MockScript::endless(), 64);
        session.mark_connected();
        session.cleanup();
        let mut dest = dirty(32);
        assert_eq!(session.render(&mut dest, RATE), RenderStatus::Terminated);
        assert!(dest.iter().all(Frame::is_silent));
        assert!(!session.is_connected());
        assert!(session.is_ended());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn pattern_change_only_on_change_row_change_every_callback() {
        let (mock, sink, mut session) = session_with(MockScript::endless(), 64);
        let handle = session.handle().unwrap();
        let mut dest = dirty(16);

        mock.lock().set_position(handle, 0, 0);
        session.render(&mut dest, RATE);
        mock.lock().set_position(handle, 0, 0);
        session.render(&mut dest, RATE);
        mock.lock().set_position(handle, 0, 5);
        session.render(&mut dest, RATE);
        mock.lock().set_position(handle, 1, 0);
        session.render(&mut dest, RATE);

        let events = sink.events();
        let pattern_changes = events.iter().filter(|e| **e == PlayerEvent::PatternChange).count();
        let rows: Vec<i32> = events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::RowChange { index } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(pattern_changes, 2);
        assert_eq!(rows, vec![0, 0, 5, 0]);
    }

    #[test]
    fn cleanup_twice_releases_once() {
        let (mock, _, mut session) = session_with(MockScript::endless(), 64);
        let first = session.cleanup();
        assert!(first.handle_destroyed);
        assert_eq!(first.buffers_freed, 2);
        assert!(session.cleanup().is_empty());
        assert_eq!(mock.lock().calls().destroys, 1);
    }

    #[test]
    fn stop_is_idempotent_and_unconditional() {
        let (mock, _, mut session) = session_with(MockScript::endless(), 64);
        session.mark_connected();
        session.pause();
        assert!(session.stop().handle_destroyed);
        assert!(session.stop().is_empty());
        assert!(!session.is_connected());
        assert!(session.is_ended());
        drop(session);
        assert_eq!(mock.lock().calls().destroys, 1);
    }

    #[test]
    fn toggle_pause_twice_restores_state() {
        let (_, _, mut session) = session_with(MockScript::endless(), 64);
        assert!(session.toggle_pause());
        assert!(!session.toggle_pause());
        assert!(!session.is_paused());
        session.pause();
        session.pause();
        assert!(session.is_paused());
        session.unpause();
        assert!(!session.is_paused());
    }

    #[test]
    fn panicking_engine_degrades_to_error_event() {
        let script = MockScript {
            panic_on_read: true,
            ..MockScript::endless()
        };
        let (_, sink, mut session) = session_with(script, 64);
        let mut dest = dirty(64);
        assert_eq!(session.render(&mut dest, RATE), RenderStatus::Terminated);
        assert!(dest.iter().all(Frame::is_silent));
        assert!(sink
            .events()
            .contains(&PlayerEvent::Error { source: ErrorSource::DecodeEngine }));
        assert!(session.handle().is_none());
    }

    #[test]
    fn queries_default_once_handle_is_gone() {
        let (_, _, mut session) = session_with(MockScript::endless(), 64);
        assert!(session.query(|engine, handle| engine.duration_seconds(handle)) > 0.0);
        session.stop();
        assert_eq!(session.query(|engine, handle| engine.duration_seconds(handle)), 0.0);
        assert_eq!(session.query(|engine, handle| engine.metadata_keys(handle)), "");
    }

    #[test]
    fn render_records_timing() {
        let (_, _, mut session) = session_with(MockScript::endless(), 64);
        let mut dest = dirty(512);
        session.render(&mut dest, RATE);
        let max = session.take_max_render_time();
        assert!(max >= session.current_render_time());
        assert_eq!(session.take_max_render_time(), Duration::ZERO);
    }

    #[test]
    fn steady_state_render_does_not_allocate() {
        let script = MockScript {
            max_frames_per_read: Some(1000),
            ..MockScript::endless()
        };
        let engine: SharedEngine = Arc::new(Mutex::new(MockEngine::with_script(script)));
        let handle = engine.lock().create(b"module").unwrap();
        let mut session = RenderSession::new(engine, handle, Arc::new(crate::NullSink));
        let mut small = dirty(333);
        let mut large = dirty(MAX_FRAMES_PER_CHUNK + 1);

        assert_no_alloc::assert_no_alloc(|| {
            for _ in 0..50 {
                session.render(&mut small, RATE);
                session.render(&mut large, RATE);
            }
            session.toggle_pause();
            session.render(&mut large, RATE);
        });
        assert!(session.is_paused());
        assert!(!session.is_ended());
    }
}
