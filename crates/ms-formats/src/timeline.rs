//! Row sequencing and song timing.
//!
//! The player and the duration walk share [`row_control`] and
//! [`next_position`], so seeking lands exactly where playback would.

use crate::mod_format::{Cell, Module, ROWS_PER_PATTERN};

/// ProTracker defaults.
pub const DEFAULT_SPEED: u32 = 6;
pub const DEFAULT_TEMPO: u32 = 125;

/// Flow-control effects found on one row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowControl {
    pub speed: Option<u32>,
    pub tempo: Option<u32>,
    /// Where to continue after this row (order, row)
    pub jump: Option<(usize, usize)>,
}

/// Collect speed/tempo/jump/break effects of a row.
pub fn row_control(cells: &[Cell], order: usize) -> RowControl {
    let mut control = RowControl::default();
    let mut jump_order = None;
    let mut break_row = None;

    for cell in cells {
        match (cell.effect, cell.param) {
            (0xF, 0) => {}
            (0xF, p) if p < 32 => control.speed = Some(p as u32),
            (0xF, p) => control.tempo = Some(p as u32),
            (0xB, p) => jump_order = Some(p as usize),
            (0xD, p) => {
                let row = (p >> 4) as usize * 10 + (p & 0x0F) as usize;
                break_row = Some(row.min(ROWS_PER_PATTERN - 1));
            }
            _ => {}
        }
    }

    control.jump = match (jump_order, break_row) {
        (None, None) => None,
        (Some(order), row) => Some((order, row.unwrap_or(0))),
        (None, Some(row)) => Some((order + 1, row)),
    };
    control
}

/// Position after `(order, row)`, wrapping to `restart` past the last order.
pub fn next_position(
    module: &Module,
    order: usize,
    row: usize,
    jump: Option<(usize, usize)>,
) -> (usize, usize) {
    let (order, row) = match jump {
        Some(target) => target,
        None if row + 1 >= ROWS_PER_PATTERN => (order + 1, 0),
        None => (order, row + 1),
    };
    if order >= module.order.len() {
        (module.restart, 0)
    } else {
        (order, row)
    }
}

/// Seconds one row lasts at the given speed and tempo.
pub fn row_seconds(speed: u32, tempo: u32) -> f64 {
    speed as f64 * 2.5 / tempo.max(1) as f64
}

/// A row reached during the first pass through the song.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowTime {
    pub seconds: f64,
    pub order: usize,
    pub row: usize,
    /// Speed in effect when the row starts
    pub speed: u32,
    /// Tempo in effect when the row starts
    pub tempo: u32,
}

/// Every row of one pass through the song, in play order.
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    rows: Vec<RowTime>,
    first_visit: Vec<Option<f64>>,
    duration: f64,
}

impl Timeline {
    /// Walk the song once, stopping at the first repeated row.
    pub fn build(module: &Module) -> Self {
        let slots = module.order.len() * ROWS_PER_PATTERN;
        let mut first_visit = vec![None; slots];
        let mut rows = Vec::new();

        let (mut order, mut row) = (0, 0);
        let (mut speed, mut tempo) = (DEFAULT_SPEED, DEFAULT_TEMPO);
        let mut seconds = 0.0;

        loop {
            let index = order * ROWS_PER_PATTERN + row;
            if index >= slots || first_visit[index].is_some() {
                break;
            }
            first_visit[index] = Some(seconds);
            rows.push(RowTime {
                seconds,
                order,
                row,
                speed,
                tempo,
            });

            let cells = module.pattern_at(order).map(|p| p.row(row)).unwrap_or(&[]);
            let control = row_control(cells, order);
            speed = control.speed.unwrap_or(speed);
            tempo = control.tempo.unwrap_or(tempo);
            seconds += row_seconds(speed, tempo);

            (order, row) = next_position(module, order, row, control.jump);
        }

        Self {
            rows,
            first_visit,
            duration: seconds,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn rows(&self) -> &[RowTime] {
        &self.rows
    }

    /// Start time of a row on the first pass.
    pub fn time_of(&self, order: usize, row: usize) -> Option<f64> {
        self.first_visit
            .get(order * ROWS_PER_PATTERN + row)
            .copied()
            .flatten()
    }

    /// Index into [`Timeline::rows`] of the row playing at `seconds`.
    pub fn locate(&self, seconds: f64) -> Option<usize> {
        if self.rows.is_empty() {
            return None;
        }
        let after = self.rows.partition_point(|r| r.seconds <= seconds);
        Some(after.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mod_format::load_mod;
    use crate::mod_format::tests::{fx, ModBuilder};
    use approx::assert_relative_eq;

    #[test]
    fn plain_pattern_lasts_64_rows() {
        let module = load_mod(&ModBuilder::new().build()).unwrap();
        let timeline = Timeline::build(&module);
        assert_eq!(timeline.rows().len(), 64);
        assert_relative_eq!(timeline.duration(), 64.0 * 0.12, epsilon = 1e-9);
    }

    #[test]
    fn speed_and_tempo_change_row_length() {
        let data = ModBuilder::new()
            .cell(0, 0, 0, fx(0xF, 3))
            .cell(0, 0, 1, fx(0xF, 150))
            .build();
        let module = load_mod(&data).unwrap();
        let timeline = Timeline::build(&module);
        assert_relative_eq!(timeline.duration(), 64.0 * row_seconds(3, 150), epsilon = 1e-9);
        assert_eq!(timeline.rows()[1].speed, 3);
        assert_eq!(timeline.rows()[0].speed, DEFAULT_SPEED);
    }

    #[test]
    fn pattern_break_skips_rows() {
        let mut builder = ModBuilder::new().cell(0, 15, 0, fx(0xD, 0x32));
        builder.order = vec![0, 0];
        let module = load_mod(&builder.build()).unwrap();
        let timeline = Timeline::build(&module);
        // 16 rows of order 0, then rows 32..63 of order 1
        assert_eq!(timeline.rows().len(), 16 + 32);
        assert_relative_eq!(timeline.time_of(1, 32).unwrap(), 16.0 * 0.12, epsilon = 1e-9);
        assert_eq!(timeline.time_of(1, 0), None);
    }

    #[test]
    fn backwards_jump_ends_the_pass() {
        let mut builder = ModBuilder::new().cell(1, 7, 3, fx(0xB, 0));
        builder.order = vec![0, 1];
        let module = load_mod(&builder.build()).unwrap();
        let timeline = Timeline::build(&module);
        assert_eq!(timeline.rows().len(), 64 + 8);
    }

    #[test]
    fn locate_finds_row_at_time() {
        let module = load_mod(&ModBuilder::new().build()).unwrap();
        let timeline = Timeline::build(&module);
        assert_eq!(timeline.locate(0.0), Some(0));
        assert_eq!(timeline.locate(0.13), Some(1));
        assert_eq!(timeline.locate(1000.0), Some(63));
    }

    #[test]
    fn break_and_jump_combine() {
        let cells = [fx(0xB, 2), fx(0xD, 0x10)];
        assert_eq!(row_control(&cells, 0).jump, Some((2, 10)));
        assert_eq!(row_control(&cells[1..], 4).jump, Some((5, 10)));
        assert_eq!(row_control(&[fx(0xF, 0)], 0), RowControl::default());
    }
}
