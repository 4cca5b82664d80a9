//! Last-observed pattern/row markers.

/// Sentinel for "no pattern observed yet". Never a valid pattern index.
pub const NO_PATTERN: i32 = -1;

/// Pattern and row seen on the previous render callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionMarkers {
    last_pattern: i32,
    last_row: i32,
}

impl Default for PositionMarkers {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionMarkers {
    pub const fn new() -> Self {
        Self {
            last_pattern: NO_PATTERN,
            last_row: 0,
        }
    }

    pub fn last_pattern(&self) -> i32 {
        self.last_pattern
    }

    pub fn last_row(&self) -> i32 {
        self.last_row
    }

    /// Record a freshly queried position.
    ///
    /// Returns `true` when the pattern differs from the one recorded on the
    /// previous call. The row is always stored.
    pub fn observe(&mut self, pattern: i32, row: i32) -> bool {
        self.last_row = row;
        if pattern != self.last_pattern {
            self.last_pattern = pattern;
            true
        } else {
            false
        }
    }
}
