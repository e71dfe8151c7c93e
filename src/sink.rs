use std::path::PathBuf;

use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId};

use crate::bridge::FinishHook;
use crate::error::PlaybackError;

/// Where the audio of a started track comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableSource {
    /// Short-lived media URL produced by the resolver.
    Stream { uri: String },
    /// A file below the music folder.
    File(PathBuf),
}

/// Control over one source that the sink is currently playing.
pub trait ActiveSource: Send + Sync {
    fn set_gain(&self, gain: f32);
    fn pause(&self);
    fn resume(&self);
    /// Must not report completion synchronously; the hook fires later from
    /// the sink's own context.
    fn stop(&self);
}

/// Voice output for guilds.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Joins `channel`. Fails with [`PlaybackError::NotConnected`] when the
    /// requester is not in a voice channel.
    async fn connect(&self, guild_id: GuildId, channel: Option<ChannelId>)
    -> Result<(), PlaybackError>;

    /// Leaves voice. Returns `true` when there was a connection to leave.
    async fn disconnect(&self, guild_id: GuildId) -> bool;

    /// Starts `source` at `gain`. `on_finish` is invoked exactly once when
    /// the source ends, errors or is stopped.
    async fn start(
        &self,
        guild_id: GuildId,
        source: PlayableSource,
        gain: f32,
        on_finish: FinishHook,
    ) -> Result<Box<dyn ActiveSource>, PlaybackError>;
}
