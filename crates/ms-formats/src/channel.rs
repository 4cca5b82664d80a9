//! Channel state for MOD playback.

use crate::frequency::{clamp_period, transpose_period};
use crate::mod_format::{Cell, Sample};

/// Mixing and effect state for a single tracker channel.
#[derive(Clone, Debug, Default)]
pub struct ChannelState {
    /// Current sample (index into the module's sample list)
    pub sample: Option<usize>,
    /// Current position in sample frames
    pub position: f64,
    /// Is the channel currently producing audio?
    pub playing: bool,
    /// Current volume (0-64)
    pub volume: u8,

    /// Current Amiga period (higher = lower pitch)
    pub period: u16,
    /// Period actually mixed this tick (differs from `period` under arpeggio)
    pub output_period: u16,
    /// Target period for tone portamento
    pub target_period: u16,
    /// Tone portamento speed (period units per tick)
    pub porta_speed: u8,

    /// Effect of the current row, replayed on every later tick
    effect: u8,
    param: u8,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a row cell on its first tick.
    pub fn apply_row(&mut self, cell: &Cell, samples: &[Sample]) {
        self.effect = cell.effect;
        self.param = cell.param;

        if cell.sample > 0 {
            let index = cell.sample as usize - 1;
            if let Some(sample) = samples.get(index) {
                self.sample = Some(index);
                self.volume = sample.volume;
            }
        }

        if cell.period > 0 {
            if cell.effect == 0x3 || cell.effect == 0x5 {
                self.target_period = cell.period;
            } else {
                self.period = cell.period;
                self.position = 0.0;
                self.playing = self.sample.is_some();
            }
        }

        match (cell.effect, cell.param) {
            (0x3, p) if p > 0 => self.porta_speed = p,
            (0x9, p) if cell.period > 0 => self.position = p as f64 * 256.0,
            (0xC, p) => self.volume = p.min(64),
            (0xE, p) => self.apply_extended(p >> 4, p & 0x0F),
            _ => {}
        }
        self.output_period = self.period;
    }

    /// E-commands that act on the first tick.
    fn apply_extended(&mut self, command: u8, value: u8) {
        match command {
            0x1 if self.period > 0 => {
                self.period = clamp_period(self.period.saturating_sub(value as u16));
            }
            0x2 if self.period > 0 => {
                self.period = clamp_period(self.period.saturating_add(value as u16));
            }
            0xA => self.volume = (self.volume + value).min(64),
            0xB => self.volume = self.volume.saturating_sub(value),
            0xC if value == 0 => self.volume = 0,
            _ => {}
        }
    }

    /// Apply the row's effect on tick `tick` (> 0).
    pub fn apply_tick(&mut self, tick: u32) {
        self.output_period = self.period;
        let (x, y) = (self.param >> 4, self.param & 0x0F);

        match self.effect {
            0x0 if self.param != 0 => {
                let semitones = match tick % 3 {
                    0 => 0,
                    1 => x,
                    _ => y,
                };
                self.output_period = transpose_period(self.period, semitones);
            }
            0x1 if self.period > 0 => {
                self.period = clamp_period(self.period.saturating_sub(self.param as u16));
                self.output_period = self.period;
            }
            0x2 if self.period > 0 => {
                self.period = clamp_period(self.period.saturating_add(self.param as u16));
                self.output_period = self.period;
            }
            0x3 => self.tone_porta(),
            0x5 => {
                self.tone_porta();
                self.volume_slide();
            }
            0x6 | 0xA => self.volume_slide(),
            0xE if x == 0xC && tick == y as u32 => self.volume = 0,
            _ => {}
        }
    }

    fn tone_porta(&mut self) {
        if self.target_period == 0 || self.period == 0 {
            return;
        }
        let speed = self.porta_speed as u16;
        self.period = if self.period < self.target_period {
            self.period.saturating_add(speed).min(self.target_period)
        } else {
            self.period.saturating_sub(speed).max(self.target_period)
        };
        self.output_period = self.period;
    }

    fn volume_slide(&mut self) {
        let (up, down) = (self.param >> 4, self.param & 0x0F);
        self.volume = if up > 0 {
            (self.volume + up).min(64)
        } else {
            self.volume.saturating_sub(down)
        };
    }
}
