//! Playback state flags for a render session.

/// Coarse playback status derived from [`PlaybackState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Playing,
    Paused,
    Ended,
}

/// Pause and end flags of one render session.
///
/// `paused` can be set and cleared freely. `ended` is terminal: once set it
/// is never cleared, and no decode call happens afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackState {
    paused: bool,
    ended: bool,
}

impl PlaybackState {
    pub const fn new() -> Self {
        Self {
            paused: false,
            ended: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Flip the pause flag, returning the new value.
    pub fn toggle_paused(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Mark the session as ended. There is no way back.
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// Ended wins over paused.
    pub fn status(&self) -> Status {
        if self.ended {
            Status::Ended
        } else if self.paused {
            Status::Paused
        } else {
            Status::Playing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_playing() {
        assert_eq!(PlaybackState::new().status(), Status::Playing);
    }

    #[test]
    fn toggle_twice_restores_flag() {
        let mut state = PlaybackState::new();
        assert!(state.toggle_paused());
        assert!(!state.toggle_paused());
        assert_eq!(state.status(), Status::Playing);
    }

    #[test]
    fn ended_takes_precedence_over_paused() {
        let mut state = PlaybackState::new();
        state.set_paused(true);
        state.end();
        assert_eq!(state.status(), Status::Ended);
        state.set_paused(false);
        assert!(state.is_ended());
    }
}
