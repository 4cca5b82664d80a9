//! Built-in ProTracker MOD decode engine for modstream.
//!
//! Parses MOD files and plays them through the [`ms_engine::DecodeEngine`]
//! interface, so the render pipeline can drive real modules without any
//! external library.

mod channel;
mod engine;
mod frequency;
mod metadata;
mod mod_format;
mod player;
mod timeline;

pub use engine::TrackerEngine;
pub use frequency::{period_to_note_name, period_to_step, PERIOD_MAX, PERIOD_MIN};
pub use metadata::{format_cell, METADATA_KEYS};
pub use mod_format::{load_mod, Cell, Module, Pattern, Sample, HEADER_SIZE, ROWS_PER_PATTERN};
pub use player::{Interpolation, Player};
pub use timeline::{RowTime, Timeline, DEFAULT_SPEED, DEFAULT_TEMPO};

use thiserror::Error;

/// Error type for format parsing.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid module header: {0}")]
    InvalidHeader(String),
    /// Unexpected end of file
    #[error("unexpected end of module data")]
    UnexpectedEof,
    /// Song length of zero or beyond the order table
    #[error("module has no playable orders")]
    NoOrders,
}
