//! End-to-end: MOD fixture → PlaybackController → offline output → WAV.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ms_audio::OfflineOutput;
use ms_engine::SharedEngine;
use ms_formats::TrackerEngine;
use ms_master::{PlaybackController, PlayerConfig, Source};
use parking_lot::Mutex;

const RATE: u32 = 44100;
/// 96 rows of 0.1 s
const SONG_FRAMES: usize = 96 * 4410;
const BLOCK: usize = 1024;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/mod/break_test.mod")
}

fn controller(config: PlayerConfig) -> PlaybackController<OfflineOutput> {
    let engine: SharedEngine = Arc::new(Mutex::new(TrackerEngine::new()));
    PlaybackController::new(engine, OfflineOutput::new(RATE), config)
}

fn counter(ctrl: &PlaybackController<OfflineOutput>, name: &str) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    ctrl.on(name, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    hits
}

fn data_size(wav: &[u8]) -> usize {
    u32::from_le_bytes(wav[40..44].try_into().unwrap()) as usize
}

#[tokio::test]
async fn single_pass_exports_whole_song() {
    let mut ctrl = controller(PlayerConfig {
        repeat_count: 0,
        ..PlayerConfig::default()
    });
    let ended = counter(&ctrl, "onEnded");
    let patterns = counter(&ctrl, "onPatternChange");

    ctrl.load_and_play(Source::Path(fixture_path())).await.unwrap();
    assert!((ctrl.duration() - 9.6).abs() < 1e-9);
    assert_eq!(ctrl.metadata()["title"], "break test");
    assert_eq!(ctrl.total_orders(), 2);

    let wav = ctrl.render_to_wav(300);
    // Every block up to and including the one that observed the end
    let frames = (SONG_FRAMES.div_ceil(BLOCK) + 1) * BLOCK;
    assert_eq!(data_size(&wav), frames * 4);
    assert_eq!(wav.len(), 44 + frames * 4);

    assert_eq!(ended.load(Ordering::SeqCst), 1);
    assert_eq!(patterns.load(Ordering::SeqCst), 2);
    assert!(ctrl.is_finished());
    assert_eq!(ctrl.duration(), 0.0);
}

#[tokio::test]
async fn looping_export_stops_at_the_time_limit() {
    let mut ctrl = controller(PlayerConfig::default());
    let ended = counter(&ctrl, "onEnded");
    ctrl.load_and_play(Source::Path(fixture_path())).await.unwrap();

    let wav = ctrl.render_to_wav(12);
    assert_eq!(data_size(&wav), 12 * RATE as usize * 4);
    assert_eq!(ended.load(Ordering::SeqCst), 0);
    assert!(ctrl.is_active());
    // Second pass, 2.4 s in
    assert!((ctrl.position() - 2.4).abs() < 0.05);
}

#[tokio::test]
async fn seek_then_render_continues_from_target() {
    let mut ctrl = controller(PlayerConfig {
        repeat_count: 0,
        ..PlayerConfig::default()
    });
    ctrl.load_and_play(Source::Path(fixture_path())).await.unwrap();
    ctrl.seek(9.0);
    assert_eq!(ctrl.current_order(), 1);
    assert_eq!(ctrl.current_pattern(), 1);

    // 0.6 s left, so the session ends well before the limit
    let frames = ctrl.render_frames(RATE as usize * 5);
    assert!(frames.len() < RATE as usize);
    assert!(ctrl.is_finished());
}

#[tokio::test]
async fn config_file_drives_playback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("player.toml");
    std::fs::write(&path, "repeat_count = 0\nstereo_separation = 0\n").unwrap();
    let config = PlayerConfig::load(&path).unwrap();

    let mut ctrl = controller(config);
    ctrl.load_and_play(Source::Path(fixture_path())).await.unwrap();
    let frames = ctrl.render_frames(RATE as usize);
    // With no separation both sides carry the same mix
    assert!(frames.iter().any(|f| !f.is_silent()));
    assert!(frames.iter().all(|f| (f.left - f.right).abs() < 1e-6));
}
