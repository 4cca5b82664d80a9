//! Events derived from the render stream.

use core::fmt;
use core::str::FromStr;

/// Where a playback error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSource {
    /// The decode engine rejected the module or tore it down mid-stream
    DecodeEngine,
    /// The host audio stream failed
    Output,
}

impl ErrorSource {
    /// Short discriminator tag handed to UI handlers.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorSource::DecodeEngine => "decode-engine",
            ErrorSource::Output => "output",
        }
    }
}

/// A discrete notification raised by a render session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Clean end of stream
    Ended,
    /// Decode or output failure
    Error { source: ErrorSource },
    /// Emitted on every render callback with the freshly queried row
    RowChange { index: i32 },
    /// The pattern differs from the previous callback
    PatternChange,
}

impl PlayerEvent {
    /// The handler name this event is dispatched under.
    pub fn name(&self) -> EventName {
        match self {
            PlayerEvent::Ended => EventName::Ended,
            PlayerEvent::Error { .. } => EventName::Error,
            PlayerEvent::RowChange { .. } => EventName::RowChange,
            PlayerEvent::PatternChange => EventName::PatternChange,
        }
    }
}

/// Names handlers are registered under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    Ended,
    Error,
    RowChange,
    PatternChange,
}

impl EventName {
    pub const ALL: [EventName; 4] = [
        EventName::Ended,
        EventName::Error,
        EventName::RowChange,
        EventName::PatternChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Ended => "onEnded",
            EventName::Error => "onError",
            EventName::RowChange => "onRowChange",
            EventName::PatternChange => "onPatternChange",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known event names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseEventNameError;

impl fmt::Display for ParseEventNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown event name")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseEventNameError {}

impl FromStr for EventName {
    type Err = ParseEventNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or(ParseEventNameError)
    }
}
