use ms_audio::AudioError;

use crate::source::LoadError;
use thiserror::Error;

/// Why `play` left no active session.
#[derive(Debug, Error)]
pub enum PlayError {
    /// The decode engine could not parse the bytes
    #[error("decode engine rejected the module")]
    Rejected,
    /// The session could not be wired into the output
    #[error("output error: {0}")]
    Output(#[from] AudioError),
}

/// Failure of a combined load and play.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Play(#[from] PlayError),
}
