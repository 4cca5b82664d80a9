//! Audio frame type.

/// A stereo audio frame (32-bit float).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self {
            left: 0.0,
            right: 0.0,
        }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }

    /// Convert to 16-bit PCM with clipping.
    pub fn to_i16(self) -> (i16, i16) {
        let convert = |s: f32| (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        (convert(self.left), convert(self.right))
    }
}

/// Overwrite every frame with silence.
pub fn fill_silence(frames: &mut [Frame]) {
    frames.fill(Frame::silence());
}
