//! Tick sequencer and mixer for a loaded MOD.

use ms_ir::RenderParam;

use crate::channel::ChannelState;
use crate::frequency::{c4_speed, period_to_step};
use crate::metadata::{self, format_cell, METADATA_KEYS};
use crate::mod_format::{Module, Sample, ROWS_PER_PATTERN};
use crate::timeline::{next_position, row_control, Timeline, DEFAULT_SPEED, DEFAULT_TEMPO};

/// Sample interpolation used by the mixer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

impl Interpolation {
    /// Map a filter length in taps: 1 is nearest, anything else linear.
    pub fn from_filter_length(taps: i32) -> Self {
        if taps == 1 {
            Interpolation::Nearest
        } else {
            Interpolation::Linear
        }
    }
}

/// Plays one module: row sequencing, per-tick effects and stereo mixing.
#[derive(Clone, Debug)]
pub struct Player {
    module: Module,
    timeline: Timeline,
    channels: Vec<ChannelState>,
    /// Rows reached during the current pass, indexed `order * 64 + row`
    visited: Vec<bool>,

    order: usize,
    row: usize,
    tick: u32,
    speed: u32,
    tempo: u32,
    started: bool,
    finished: bool,
    pending_jump: Option<(usize, usize)>,

    tick_frames_left: usize,
    tick_fraction: f64,
    position_seconds: f64,
    /// Extra passes still to play; negative loops forever
    repeats_left: i32,

    stereo_separation: i32,
    interpolation: Interpolation,
    gain: f32,
}

impl Player {
    pub fn new(module: Module) -> Self {
        let timeline = Timeline::build(&module);
        let mut visited = vec![false; module.order.len() * ROWS_PER_PATTERN];
        if let Some(first) = visited.first_mut() {
            *first = true;
        }
        let channels = vec![ChannelState::new(); module.channels];

        Self {
            module,
            timeline,
            channels,
            visited,
            order: 0,
            row: 0,
            tick: 0,
            speed: DEFAULT_SPEED,
            tempo: DEFAULT_TEMPO,
            started: false,
            finished: false,
            pending_jump: None,
            tick_frames_left: 0,
            tick_fraction: 0.0,
            position_seconds: 0.0,
            repeats_left: 0,
            stereo_separation: 100,
            interpolation: Interpolation::default(),
            gain: 1.0,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current_order(&self) -> usize {
        self.order
    }

    pub fn current_row(&self) -> usize {
        self.row
    }

    pub fn current_pattern(&self) -> usize {
        self.module.order.get(self.order).copied().unwrap_or(0) as usize
    }

    pub fn current_speed(&self) -> u32 {
        self.speed
    }

    pub fn current_tempo(&self) -> u32 {
        self.tempo
    }

    pub fn position_seconds(&self) -> f64 {
        self.position_seconds
    }

    /// Length of one pass through the song.
    pub fn duration_seconds(&self) -> f64 {
        self.timeline.duration()
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn stereo_separation(&self) -> i32 {
        self.stereo_separation
    }

    /// -1 loops forever, 0 plays once, `n` plays `n` extra passes.
    pub fn set_repeat_count(&mut self, count: i32) {
        self.repeats_left = count;
    }

    pub fn set_render_param(&mut self, param: RenderParam) {
        match param {
            RenderParam::MasterGain(millibel) => {
                self.gain = 10f32.powf(millibel as f32 / 2000.0);
            }
            RenderParam::StereoSeparation(percent) => {
                self.stereo_separation = percent.clamp(0, 200);
            }
            RenderParam::InterpolationFilter(taps) => {
                self.interpolation = Interpolation::from_filter_length(taps);
            }
            // The mixer has no click removal to tune
            RenderParam::VolumeRamping(_) => {}
        }
    }

    /// Jump to the row playing at `seconds` on the first pass.
    pub fn seek(&mut self, seconds: f64) {
        let Some(index) = self.timeline.locate(seconds.max(0.0)) else {
            return;
        };
        let target = self.timeline.rows()[index];

        self.visited.fill(false);
        for row in &self.timeline.rows()[..=index] {
            self.visited[row.order * ROWS_PER_PATTERN + row.row] = true;
        }

        self.order = target.order;
        self.row = target.row;
        self.speed = target.speed;
        self.tempo = target.tempo;
        self.tick = 0;
        self.started = false;
        self.finished = false;
        self.pending_jump = None;
        self.tick_frames_left = 0;
        self.tick_fraction = 0.0;
        self.position_seconds = target.seconds;
        self.channels.fill(ChannelState::new());
    }

    pub fn metadata_keys(&self) -> &'static str {
        METADATA_KEYS
    }

    pub fn metadata(&self, key: &str) -> String {
        metadata::metadata(&self.module, key)
    }

    /// Text for one cell, empty when the position does not exist.
    pub fn format_cell(&self, pattern: usize, row: usize, channel: usize) -> String {
        self.module
            .patterns
            .get(pattern)
            .and_then(|p| p.cell(row, channel))
            .map(format_cell)
            .unwrap_or_default()
    }

    /// Render up to `left.len()` frames. Returns 0 once the song is over.
    pub fn render(&mut self, sample_rate: u32, left: &mut [f32], right: &mut [f32]) -> usize {
        if sample_rate == 0 {
            return 0;
        }
        let frames = left.len().min(right.len());
        let mut produced = 0;

        while produced < frames {
            if self.tick_frames_left == 0 && !self.advance_tick(sample_rate) {
                break;
            }
            let count = self.tick_frames_left.min(frames - produced);
            let range = produced..produced + count;
            self.mix(sample_rate, &mut left[range.clone()], &mut right[range]);
            self.tick_frames_left -= count;
            produced += count;
            self.position_seconds += count as f64 / sample_rate as f64;
        }
        produced
    }

    /// Move to the next tick. `false` when the song has ended.
    fn advance_tick(&mut self, sample_rate: u32) -> bool {
        if self.finished {
            return false;
        }
        if !self.started {
            self.started = true;
            self.process_row();
        } else {
            self.tick += 1;
            if self.tick >= self.speed {
                self.tick = 0;
                if !self.next_row() {
                    self.finished = true;
                    return false;
                }
                self.process_row();
            } else {
                let tick = self.tick;
                for channel in &mut self.channels {
                    channel.apply_tick(tick);
                }
            }
        }

        let exact = sample_rate as f64 * 2.5 / self.tempo.max(1) as f64 + self.tick_fraction;
        let whole = exact.floor();
        self.tick_frames_left = (whole as usize).max(1);
        self.tick_fraction = exact - whole;
        true
    }

    /// Step to the following row, ending the pass on a revisit.
    fn next_row(&mut self) -> bool {
        let jump = self.pending_jump.take();
        let (order, row) = next_position(&self.module, self.order, self.row, jump);
        let index = order * ROWS_PER_PATTERN + row;

        if self.visited.get(index).copied().unwrap_or(true) {
            if !self.begin_next_pass() {
                return false;
            }
            self.visited.fill(false);
            self.position_seconds = self.timeline.time_of(order, row).unwrap_or(0.0);
        }
        if let Some(slot) = self.visited.get_mut(index) {
            *slot = true;
        }

        self.order = order;
        self.row = row;
        true
    }

    fn begin_next_pass(&mut self) -> bool {
        match self.repeats_left {
            0 => false,
            n if n > 0 => {
                self.repeats_left -= 1;
                true
            }
            _ => true,
        }
    }

    fn process_row(&mut self) {
        let Some(pattern) = self.module.pattern_at(self.order) else {
            return;
        };
        let cells = pattern.row(self.row);

        let control = row_control(cells, self.order);
        if let Some(speed) = control.speed {
            self.speed = speed;
        }
        if let Some(tempo) = control.tempo {
            self.tempo = tempo;
        }
        self.pending_jump = control.jump;

        for (channel, cell) in self.channels.iter_mut().zip(cells) {
            channel.apply_row(cell, &self.module.samples);
        }
    }

    /// Mix every channel into `left`/`right`, overwriting them.
    fn mix(&mut self, sample_rate: u32, left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        right.fill(0.0);

        let separation = self.stereo_separation as f32 / 100.0;
        let interpolation = self.interpolation;
        // Two hard-panned channels land on each side
        let gain = self.gain * 0.5;

        for (index, channel) in self.channels.iter_mut().enumerate() {
            if !channel.playing {
                continue;
            }
            let Some(sample) = channel.sample.and_then(|s| self.module.samples.get(s)) else {
                continue;
            };
            if sample.is_empty() {
                channel.playing = false;
                continue;
            }

            // Amiga LRRL panning
            let pan = if matches!(index % 4, 0 | 3) { -1.0 } else { 1.0 };
            let volume = channel.volume as f32 / 64.0 * gain;
            let left_gain = volume * 0.5 * (1.0 - pan * separation);
            let right_gain = volume * 0.5 * (1.0 + pan * separation);
            let step = period_to_step(channel.output_period, c4_speed(sample.finetune), sample_rate);

            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                let value = sample_at(sample, channel.position, interpolation);
                *l += value * left_gain;
                *r += value * right_gain;

                channel.position += step;
                if sample.has_loop() {
                    let loop_len = (sample.loop_end - sample.loop_start) as f64;
                    while channel.position >= sample.loop_end as f64 {
                        channel.position -= loop_len;
                    }
                } else if channel.position >= sample.len() as f64 {
                    channel.playing = false;
                    break;
                }
            }
        }
    }
}

/// Read a sample value in [-1, 1) at a fractional position.
fn sample_at(sample: &Sample, position: f64, interpolation: Interpolation) -> f32 {
    let index = position as usize;
    let current = sample.data.get(index).copied().unwrap_or(0) as f32 / 128.0;
    match interpolation {
        Interpolation::Nearest => current,
        Interpolation::Linear => {
            let next_index = if sample.has_loop() && index + 1 >= sample.loop_end {
                sample.loop_start
            } else {
                index + 1
            };
            let next = sample.data.get(next_index).copied().unwrap_or(0) as f32 / 128.0;
            let frac = (position - index as f64) as f32;
            current + (next - current) * frac
        }
    }
}
