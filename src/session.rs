//! Per-guild playback state.
//!
//! A [`GuildSession`] is only ever touched through its [`SessionHandle`]
//! mutex, and the [`SessionRegistry`] guarantees one session per guild.

use std::f64::consts::E;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serenity::all::GuildId;
use tokio::sync::Mutex;

use crate::database::models::{QueueEntry, Track};
use crate::error::PlaybackError;
use crate::sink::ActiveSource;

/// Maps a 0..=100 volume percent onto output gain with `(p / 100) ^ e`.
pub fn gain_from_percent(percent: i32) -> f64 {
    (f64::from(percent.clamp(0, 100)) / 100.0).powf(E)
}

/// Inverse of [`gain_from_percent`], rounded to the nearest percent.
pub fn percent_from_gain(gain: f64) -> i32 {
    (gain.clamp(0.0, 1.0).powf(1.0 / E) * 100.0).round() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Connecting,
    Playing,
    Paused,
    Disconnecting,
}

/// Identifies one voice connection of a guild. Every connect issues a new
/// handle, so work started under an older connection can tell it is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHandle(u64);

/// The queue entry whose audio is currently live in the sink.
pub struct NowPlaying {
    pub entry: QueueEntry,
    pub track: Track,
    pub play_id: u64,
    source: Box<dyn ActiveSource>,
}

impl NowPlaying {
    pub fn new(entry: QueueEntry, track: Track, play_id: u64, source: Box<dyn ActiveSource>) -> Self {
        Self {
            entry,
            track,
            play_id,
            source,
        }
    }

    /// Ends the source; the sink reports completion through its hook.
    pub fn stop(&self) {
        self.source.stop();
    }
}

impl fmt::Debug for NowPlaying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NowPlaying")
            .field("entry", &self.entry.id)
            .field("track", &self.track.id)
            .field("play_id", &self.play_id)
            .finish()
    }
}

#[derive(Debug)]
pub struct GuildSession {
    guild_id: GuildId,
    state: PlaybackState,
    gain: f64,
    transport: Option<TransportHandle>,
    connections: u64,
    now_playing: Option<NowPlaying>,
    last_actor: Option<String>,
    /// Leaves we asked for whose gateway echo has not arrived yet.
    requested_leaves: u32,
}

impl GuildSession {
    pub fn new(guild_id: GuildId, volume_percent: i32) -> Self {
        Self {
            guild_id,
            state: PlaybackState::Idle,
            gain: gain_from_percent(volume_percent),
            transport: None,
            connections: 0,
            now_playing: None,
            last_actor: None,
            requested_leaves: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn volume_percent(&self) -> i32 {
        percent_from_gain(self.gain)
    }

    /// Stores the new gain and pushes it to the live source, if any.
    /// Returns the percent read back through the curve.
    pub fn set_volume(&mut self, percent: i32) -> i32 {
        self.gain = gain_from_percent(percent);
        if let Some(now) = &self.now_playing {
            now.source.set_gain(self.gain as f32);
        }
        self.volume_percent()
    }

    pub fn transport(&self) -> Option<TransportHandle> {
        self.transport
    }

    pub fn require_transport(&self) -> Result<TransportHandle, PlaybackError> {
        self.transport.ok_or(PlaybackError::NotConnected)
    }

    pub(crate) fn attach(&mut self) -> TransportHandle {
        self.connections += 1;
        let handle = TransportHandle(self.connections);
        self.transport = Some(handle);
        handle
    }

    pub(crate) fn detach(&mut self) -> Option<TransportHandle> {
        self.transport.take()
    }

    pub(crate) fn expect_leave(&mut self) {
        self.requested_leaves += 1;
    }

    /// Consumes one requested leave. `false` means the disconnect came from
    /// outside.
    pub(crate) fn take_expected_leave(&mut self) -> bool {
        if self.requested_leaves == 0 {
            return false;
        }
        self.requested_leaves -= 1;
        true
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub(crate) fn begin(&mut self, now: NowPlaying) {
        debug_assert!(self.now_playing.is_none(), "second live source for one guild");
        self.now_playing = Some(now);
        self.state = PlaybackState::Playing;
    }

    pub(crate) fn take_now_playing(&mut self) -> Option<NowPlaying> {
        self.now_playing.take()
    }

    pub fn last_actor(&self) -> Option<&str> {
        self.last_actor.as_deref()
    }

    pub(crate) fn remember_actor(&mut self, name: &str) {
        self.last_actor = Some(name.to_string());
    }

    pub fn pause(&mut self) -> Result<&NowPlaying, PlaybackError> {
        self.require_transport()?;
        match (&self.now_playing, self.state) {
            (Some(now), PlaybackState::Playing) => {
                now.source.pause();
                self.state = PlaybackState::Paused;
                Ok(now)
            }
            _ => Err(PlaybackError::NotFound("nothing is playing".to_string())),
        }
    }

    pub fn resume(&mut self) -> Result<&NowPlaying, PlaybackError> {
        self.require_transport()?;
        match (&self.now_playing, self.state) {
            (Some(now), PlaybackState::Paused) => {
                now.source.resume();
                self.state = PlaybackState::Playing;
                Ok(now)
            }
            _ => Err(PlaybackError::NotFound("nothing is paused".to_string())),
        }
    }
}

pub type SessionHandle = Arc<Mutex<GuildSession>>;

/// All guild sessions of the process, created lazily on first use.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionHandle>,
    default_volume: i32,
}

impl SessionRegistry {
    pub fn new(default_volume: i32) -> Self {
        Self {
            sessions: DashMap::new(),
            default_volume,
        }
    }

    /// Returns the guild's session, inserting it atomically if absent.
    pub fn get_or_create(&self, guild_id: GuildId) -> SessionHandle {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(GuildSession::new(guild_id, self.default_volume))))
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSource, SourceCall, queue_entry, track};
    use pretty_assertions::assert_eq;

    #[test]
    fn volume_round_trips_within_one_percent() {
        for p in 0..=100 {
            let back = percent_from_gain(gain_from_percent(p));
            assert!((back - p).abs() <= 1, "{p} came back as {back}");
        }
        for p in [0, 5, 50, 100] {
            assert_eq!(percent_from_gain(gain_from_percent(p)), p);
        }
    }

    #[test]
    fn volume_curve_is_exponential_and_clamped() {
        assert_eq!(gain_from_percent(100), 1.0);
        assert_eq!(gain_from_percent(0), 0.0);
        assert!((gain_from_percent(50) - 0.5f64.powf(E)).abs() < 1e-12);
        assert_eq!(gain_from_percent(150), 1.0);
        assert_eq!(gain_from_percent(-20), 0.0);
    }

    #[test]
    fn set_volume_reaches_live_source() {
        let mut session = GuildSession::new(GuildId::new(1), 33);
        assert_eq!(session.set_volume(80), 80);

        let (source, calls) = FakeSource::new();
        session.attach();
        session.begin(NowPlaying::new(queue_entry(1, 1), track(1), 1, Box::new(source)));
        assert_eq!(session.set_volume(120), 100);

        assert_eq!(calls.lock().clone(), vec![SourceCall::Gain(1.0)]);
    }

    #[test]
    fn pause_requires_connection() {
        let mut session = GuildSession::new(GuildId::new(1), 33);
        assert!(matches!(session.pause(), Err(PlaybackError::NotConnected)));
        session.attach();
        assert!(matches!(session.pause(), Err(PlaybackError::NotFound(_))));
    }

    #[test]
    fn pause_and_resume_toggle_state() {
        let mut session = GuildSession::new(GuildId::new(1), 33);
        let (source, calls) = FakeSource::new();
        session.attach();
        session.begin(NowPlaying::new(queue_entry(1, 1), track(1), 1, Box::new(source)));

        session.pause().unwrap();
        assert_eq!(session.state(), PlaybackState::Paused);
        assert!(session.pause().is_err());
        session.resume().unwrap();
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(calls.lock().clone(), vec![SourceCall::Pause, SourceCall::Resume]);
    }

    #[test]
    fn each_connection_gets_a_new_handle() {
        let mut session = GuildSession::new(GuildId::new(1), 33);
        let first = session.attach();
        assert_eq!(session.detach(), Some(first));
        let second = session.attach();
        assert_ne!(first, second);
    }

    #[test]
    fn requested_leaves_are_consumed_once() {
        let mut session = GuildSession::new(GuildId::new(1), 33);
        assert!(!session.take_expected_leave());
        session.expect_leave();
        session.expect_leave();
        assert!(session.take_expected_leave());
        assert!(session.take_expected_leave());
        assert!(!session.take_expected_leave());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creation_yields_one_session() {
        let registry = Arc::new(SessionRegistry::new(33));
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_or_create(GuildId::new(9)) })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert_eq!(registry.len(), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }
}
