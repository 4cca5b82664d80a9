//! Amiga period math for sample playback.
//!
//! Converts an Amiga period + sample finetune + output sample rate into a
//! per-frame step through sample data.

/// Amiga period for C-2, the note a sample's c4_speed refers to.
const C2_PERIOD: f64 = 428.0;

/// Standard Amiga sample rate at C-2.
pub const BASE_C4_SPEED: f64 = 8363.0;

/// Lowest allowed period (highest pitch, B-3 in Amiga notation).
pub const PERIOD_MIN: u16 = 113;

/// Highest allowed period (lowest pitch, C-1 in Amiga notation).
pub const PERIOD_MAX: u16 = 856;

/// ProTracker periods for C-1 through B-3.
pub const PERIODS: [u16; 36] = [
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, // Octave 1
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, // Octave 2
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, // Octave 3
];

const NOTE_NAMES: [&str; 12] = [
    "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
];

/// Clamp a period into the playable range.
pub fn clamp_period(period: u16) -> u16 {
    period.clamp(PERIOD_MIN, PERIOD_MAX)
}

/// Index into [`PERIODS`] of the closest table entry, or `None` for period 0.
pub fn period_to_note_index(period: u16) -> Option<usize> {
    if period == 0 {
        return None;
    }
    PERIODS
        .iter()
        .enumerate()
        .min_by_key(|(_, &p)| (period as i32 - p as i32).unsigned_abs())
        .map(|(i, _)| i)
}

/// ProTracker note name (`C-1` .. `B-3`) for a period, `---` for none.
pub fn period_to_note_name(period: u16) -> String {
    match period_to_note_index(period) {
        Some(i) => format!("{}{}", NOTE_NAMES[i % 12], i / 12 + 1),
        None => "---".to_string(),
    }
}

/// Shift a period by `semitones` (positive = higher pitch).
pub fn transpose_period(period: u16, semitones: u8) -> u16 {
    if period == 0 || semitones == 0 {
        return period;
    }
    let shifted = period as f64 / 2f64.powf(semitones as f64 / 12.0);
    (shifted.round() as u16).max(1)
}

/// Sample rate at C-2 for a sample with the given finetune (-8..=7, 1/8 semitones).
pub fn c4_speed(finetune: i8) -> f64 {
    BASE_C4_SPEED * 2f64.powf(finetune as f64 / 96.0)
}

/// Sample frames to advance per output frame.
///
/// freq = c4_speed * 428 / period, step = freq / sample_rate.
pub fn period_to_step(period: u16, c4_speed: f64, sample_rate: u32) -> f64 {
    if period == 0 || sample_rate == 0 {
        return 0.0;
    }
    c4_speed * C2_PERIOD / period as f64 / sample_rate as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    #[test]
    fn c2_period_plays_at_c4_speed() {
        let step = period_to_step(428, BASE_C4_SPEED, SAMPLE_RATE);
        assert!((step - BASE_C4_SPEED / SAMPLE_RATE as f64).abs() < 1e-9);
    }

    #[test]
    fn halving_period_doubles_step() {
        let base = period_to_step(428, BASE_C4_SPEED, SAMPLE_RATE);
        let octave_up = period_to_step(214, BASE_C4_SPEED, SAMPLE_RATE);
        assert!((octave_up - base * 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_period_or_rate_gives_zero_step() {
        assert_eq!(period_to_step(0, BASE_C4_SPEED, SAMPLE_RATE), 0.0);
        assert_eq!(period_to_step(428, BASE_C4_SPEED, 0), 0.0);
    }

    #[test]
    fn note_names_cover_three_octaves() {
        assert_eq!(period_to_note_name(856), "C-1");
        assert_eq!(period_to_note_name(428), "C-2");
        assert_eq!(period_to_note_name(404), "C#2");
        assert_eq!(period_to_note_name(113), "B-3");
        assert_eq!(period_to_note_name(0), "---");
    }

    #[test]
    fn closest_period_wins() {
        assert_eq!(period_to_note_index(430), Some(12));
        assert_eq!(period_to_note_index(1000), Some(0));
    }

    #[test]
    fn transpose_by_octave_halves_period() {
        assert_eq!(transpose_period(428, 12), 214);
        assert_eq!(transpose_period(428, 0), 428);
        assert_eq!(transpose_period(0, 7), 0);
    }

    #[test]
    fn finetune_shifts_c4_speed() {
        assert_eq!(c4_speed(0), BASE_C4_SPEED);
        assert!(c4_speed(7) > BASE_C4_SPEED);
        assert!(c4_speed(-8) < BASE_C4_SPEED);
    }

    #[test]
    fn clamp_period_bounds() {
        assert_eq!(clamp_period(428), 428);
        assert_eq!(clamp_period(50), PERIOD_MIN);
        assert_eq!(clamp_period(1000), PERIOD_MAX);
    }
}
