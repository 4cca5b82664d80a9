//! CPAL-based audio output backend.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use ms_engine::{fill_silence, ErrorSource, EventSink, Frame, PlayerEvent};
use parking_lot::Mutex;

use crate::node::{render_node, SessionNode};
use crate::traits::{AudioError, OutputGraph, DEFAULT_SAMPLE_RATE};

/// Frames rendered per session step inside one device callback.
const CALLBACK_FRAMES: usize = 8192;

/// CPAL-based realtime output.
///
/// The device callback reuses one render buffer sized at unlock and never
/// waits on the session lock; contention yields silence for that callback.
///
/// Nothing touches the audio device until [`OutputGraph::unlock`]; the
/// stream then runs for the lifetime of the output, rendering silence
/// while no session is connected.
pub struct CpalOutput {
    config: Option<StreamConfig>,
    stream: Option<Stream>,
    slot: Arc<Mutex<Option<SessionNode>>>,
    error_sink: Arc<Mutex<Option<Arc<dyn EventSink>>>>,
}

impl CpalOutput {
    /// Create an output without opening a device.
    pub fn new() -> Self {
        Self {
            config: None,
            stream: None,
            slot: Arc::new(Mutex::new(None)),
            error_sink: Arc::new(Mutex::new(None)),
        }
    }

    /// Open the default device and start the stream.
    fn open_stream(&mut self) -> Result<(), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // Force stereo output: the callback interleaves exactly two channels
        config.channels = 2;

        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;
        let slot = self.slot.clone();
        let error_sink = self.error_sink.clone();
        let mut frames = vec![Frame::silence(); CALLBACK_FRAMES];

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Hosts that ask for more than the preallocated buffer get it in pieces.
                    for piece in data.chunks_mut(frames.len() * channels) {
                        let dest = &mut frames[..piece.len() / channels];

                        match slot.try_lock() {
                            Some(mut guard) => {
                                render_node(&mut guard, dest, sample_rate);
                            }
                            None => fill_silence(dest),
                        }

                        // Write stereo pair; zero-fill any extra channels
                        for (chunk, frame) in piece.chunks_mut(channels).zip(dest.iter()) {
                            for (i, sample) in chunk.iter_mut().enumerate() {
                                *sample = match i {
                                    0 => frame.left,
                                    1 => frame.right,
                                    _ => 0.0,
                                };
                            }
                        }
                    }
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                    if let Some(sink) = error_sink.lock().as_ref() {
                        sink.emit(PlayerEvent::Error {
                            source: ErrorSource::Output,
                        });
                    }
                },
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        tracing::info!(device = %name, sample_rate, "audio output unlocked");

        self.config = Some(config);
        self.stream = Some(stream);
        Ok(())
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputGraph for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config
            .as_ref()
            .map_or(DEFAULT_SAMPLE_RATE, |config| config.sample_rate.0)
    }

    fn is_unlocked(&self) -> bool {
        self.stream.is_some()
    }

    fn unlock(&mut self) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.open_stream()
    }

    fn connect(&mut self, node: SessionNode) -> Result<(), AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::Locked);
        }
        self.disconnect();
        node.lock().mark_connected();
        *self.slot.lock() = Some(node);
        Ok(())
    }

    fn disconnect(&mut self) {
        let previous = self.slot.lock().take();
        if let Some(node) = previous {
            node.lock().mark_disconnected();
        }
    }

    fn is_connected(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        *self.error_sink.lock() = Some(sink);
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.disconnect();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::warn!("failed to pause audio stream: {}", e);
            }
        }
    }
}
