use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::all::{ChannelId, GuildId};
use songbird::{
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
    driver::Bitrate,
    input::{File as FileInput, HttpRequest, Input},
    tracks::{PlayMode, Track, TrackHandle},
};
use tracing::{debug, error, info, warn};

use crate::bridge::FinishHook;
use crate::error::PlaybackError;
use crate::sink::{ActiveSource, PlayableSource, PlaybackSink};

const MAX_JOIN_ATTEMPTS: u32 = 5;

/// Plays sources into Discord voice channels through songbird.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    bitrate: i32,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, bitrate: i32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            bitrate,
        }
    }
}

#[async_trait]
impl PlaybackSink for SongbirdSink {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel: Option<ChannelId>,
    ) -> Result<(), PlaybackError> {
        let channel_id = channel.ok_or(PlaybackError::NotConnected)?;

        let mut attempts = 0;
        loop {
            info!(
                "Attempting to join voice channel {} in guild {} (attempt {}/{})",
                channel_id,
                guild_id,
                attempts + 1,
                MAX_JOIN_ATTEMPTS
            );
            match self.manager.join(guild_id, channel_id).await {
                Ok(call_lock) => {
                    let mut call = call_lock.lock().await;
                    call.set_bitrate(Bitrate::BitsPerSecond(self.bitrate));
                    info!("Joined voice channel {} after {} attempt(s)", channel_id, attempts + 1);
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= MAX_JOIN_ATTEMPTS {
                        error!(
                            "Failed to join voice channel {} in guild {} after {} attempts: {}",
                            channel_id, guild_id, attempts, e
                        );
                        return Err(PlaybackError::NotConnected);
                    }
                    let delay_ms = std::cmp::min(5000, 1000 * 2_u64.pow(attempts - 1));
                    warn!(
                        "Voice channel join attempt {} failed: {}. Retrying in {}ms...",
                        attempts, e, delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    async fn disconnect(&self, guild_id: GuildId) -> bool {
        match self.manager.remove(guild_id).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Leaving voice in guild {}: {}", guild_id, e);
                false
            }
        }
    }

    async fn start(
        &self,
        guild_id: GuildId,
        source: PlayableSource,
        gain: f32,
        on_finish: FinishHook,
    ) -> Result<Box<dyn ActiveSource>, PlaybackError> {
        let call_lock = self
            .manager
            .get(guild_id)
            .ok_or(PlaybackError::NotConnected)?;

        let input: Input = match source {
            PlayableSource::Stream { uri } => HttpRequest::new(self.http.clone(), uri).into(),
            PlayableSource::File(path) => FileInput::new(path).into(),
        };

        let handle: TrackHandle = {
            let mut call = call_lock.lock().await;
            call.play(Track::new(input).volume(gain))
        };

        let hook = Arc::new(Mutex::new(Some(on_finish)));
        for event in [TrackEvent::End, TrackEvent::Error] {
            let handler = TrackFinished {
                hook: Arc::clone(&hook),
            };
            if let Err(e) = handle.add_event(Event::Track(event), handler) {
                let _ = handle.stop();
                return Err(PlaybackError::SourceUnavailable(format!(
                    "track ended before it could be tracked: {e}"
                )));
            }
        }
        Ok(Box::new(SongbirdSource(handle)))
    }
}

struct SongbirdSource(TrackHandle);

impl ActiveSource for SongbirdSource {
    fn set_gain(&self, gain: f32) {
        if let Err(e) = self.0.set_volume(gain) {
            debug!("Volume change on finished track ignored: {}", e);
        }
    }

    fn pause(&self) {
        if let Err(e) = self.0.pause() {
            debug!("Pause on finished track ignored: {}", e);
        }
    }

    fn resume(&self) {
        if let Err(e) = self.0.play() {
            debug!("Resume on finished track ignored: {}", e);
        }
    }

    fn stop(&self) {
        if let Err(e) = self.0.stop() {
            debug!("Stop on finished track ignored: {}", e);
        }
    }
}

/// Forwards the first end or error event of a track to its hook.
struct TrackFinished {
    hook: Arc<Mutex<Option<FinishHook>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackFinished {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let Some(hook) = self.hook.lock().take() else {
            return Some(Event::Cancel);
        };
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{e:?}")),
                _ => None,
            }),
            _ => None,
        };
        let guild_id = hook.guild_id();
        // the hook blocks until the completion is handled
        tokio::task::spawn_blocking(move || {
            if let Err(e) = hook.finish(error) {
                debug!("Completion for guild {} not confirmed: {}", guild_id, e);
            }
        });
        Some(Event::Cancel)
    }
}
