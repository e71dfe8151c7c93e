use std::time::Duration;

use serenity::all::GuildId;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::database::models::Track;
use crate::resolver::ResolveError;

/// Shown for failures that have no message of their own.
pub const GENERIC_FAILURE: &str = "Something went wrong, try again later.";

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("track is already in the catalog as #{} ({})", .existing.id, .existing.name)]
    DuplicateTrack { existing: Box<Track> },

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("storage failure: {0}")]
    StorageFailure(#[source] CatalogError),

    #[error("completion hand-off for guild {guild_id} timed out after {waited:?}")]
    CallbackTimeout { guild_id: GuildId, waited: Duration },
}

impl PlaybackError {
    /// Short text suitable for a chat reply.
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::InvalidInput(what) => format!("Incorrect arguments: {what}"),
            PlaybackError::NotFound(what) => format!("Not found: {what}"),
            PlaybackError::DuplicateTrack { existing } => {
                format!("**{}** is already saved as #{}", existing.name, existing.id)
            }
            PlaybackError::SourceUnavailable(_) => "Requested song is unavailable".to_string(),
            PlaybackError::NotConnected => "Connect to a voice channel first.".to_string(),
            PlaybackError::StorageFailure(_) | PlaybackError::CallbackTimeout { .. } => {
                GENERIC_FAILURE.to_string()
            }
        }
    }
}

impl From<CatalogError> for PlaybackError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Duplicate { existing } => PlaybackError::DuplicateTrack { existing },
            other => PlaybackError::StorageFailure(other),
        }
    }
}

impl From<ResolveError> for PlaybackError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidSource(reason) => PlaybackError::InvalidInput(reason),
            unavailable @ ResolveError::Unavailable { .. } => {
                PlaybackError::SourceUnavailable(unavailable.to_string())
            }
        }
    }
}
