//! Per-guild queue and playback state machine.
//!
//! Every operation on a guild runs under that guild's session lock. The lock
//! is released only while a queue entry is being resolved, so `stop` can
//! interrupt a slow resolution; the resolution then notices that its
//! [`TransportHandle`] is gone and discards its result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serenity::all::{ChannelId, GuildId};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::bridge::{Completion, CompletionBridge, CompletionTarget};
use crate::catalog::{CatalogError, CatalogStore, TrackDraft, TrackRef};
use crate::config::Settings;
use crate::database::models::{PlaybackRecord, QueueEntry, Track};
use crate::error::PlaybackError;
use crate::metrics::METRICS;
use crate::resolver::TrackResolver;
use crate::session::{GuildSession, NowPlaying, PlaybackState, SessionRegistry, TransportHandle};
use crate::sink::{PlayableSource, PlaybackSink};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "mp4"];

/// What to do when a queue entry cannot be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancePolicy {
    /// Drop the entry and try the next one, giving up after
    /// `max_consecutive` failures in a row (`None` = never give up).
    Skip { max_consecutive: Option<u32> },
    /// Drop the entry and stop playback.
    Halt,
}

impl Default for AdvancePolicy {
    fn default() -> Self {
        AdvancePolicy::Skip {
            max_consecutive: Some(10),
        }
    }
}

impl AdvancePolicy {
    fn allows_retry(self, failures: usize) -> bool {
        match self {
            AdvancePolicy::Halt => false,
            AdvancePolicy::Skip {
                max_consecutive: None,
            } => true,
            AdvancePolicy::Skip {
                max_consecutive: Some(max),
            } => failures < max as usize,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub default_volume: i32,
    pub callback_timeout: Duration,
    pub policy: AdvancePolicy,
    pub music_dir: PathBuf,
}

impl From<&Settings> for PlaybackOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            default_volume: settings.default_volume,
            callback_timeout: settings.callback_timeout,
            policy: settings.advance_policy,
            music_dir: settings.music_folder.clone(),
        }
    }
}

/// The user on whose behalf a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    pub voice_channel: Option<ChannelId>,
}

#[derive(Debug)]
pub struct SkippedEntry {
    pub entry: QueueEntry,
    pub error: PlaybackError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Started { entry: QueueEntry, track: Track },
    /// The queue ran dry; the guild is idle again.
    Exhausted,
    /// The advance policy gave up on unplayable entries.
    Halted,
    /// The connection this advance belonged to was released meanwhile.
    Cancelled,
    AlreadyPlaying,
}

#[derive(Debug)]
pub struct AdvanceReport {
    pub outcome: AdvanceOutcome,
    pub skipped: Vec<SkippedEntry>,
}

impl AdvanceReport {
    fn new(outcome: AdvanceOutcome, skipped: Vec<SkippedEntry>) -> Self {
        Self { outcome, skipped }
    }
}

#[derive(Debug)]
pub enum PlayOutcome {
    Advanced(AdvanceReport),
    AlreadyPlaying,
    NothingToPlay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub entry: QueueEntry,
    pub track: Track,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removed {
    Dequeued { entry: QueueEntry, track: Option<Track> },
    /// The entry was playing; its source was stopped.
    Skipped { track: Track },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLine {
    pub position: usize,
    pub entry: QueueEntry,
    pub track: Option<Track>,
    pub playing: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub duplicates: usize,
}

pub struct Orchestrator {
    catalog: Arc<dyn CatalogStore>,
    resolver: Arc<dyn TrackResolver>,
    sink: Arc<dyn PlaybackSink>,
    sessions: SessionRegistry,
    bridge: CompletionBridge,
    policy: AdvancePolicy,
    music_dir: PathBuf,
    play_ids: AtomicU64,
}

impl Orchestrator {
    /// `runtime` is where completions reported by the sink are handled.
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        resolver: Arc<dyn TrackResolver>,
        sink: Arc<dyn PlaybackSink>,
        runtime: Handle,
        options: PlaybackOptions,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &std::sync::Weak<Self>| {
            let target: std::sync::Weak<dyn CompletionTarget> = weak.clone();
            Self {
                catalog,
                resolver,
                sink,
                sessions: SessionRegistry::new(options.default_volume),
                bridge: CompletionBridge::new(runtime, target, options.callback_timeout),
                policy: options.policy,
                music_dir: options.music_dir,
                play_ids: AtomicU64::new(0),
            }
        })
    }

    pub async fn state(&self, guild_id: GuildId) -> PlaybackState {
        match self.sessions.get(guild_id) {
            Some(handle) => handle.lock().await.state(),
            None => PlaybackState::Idle,
        }
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        let handle = self.sessions.get(guild_id)?;
        let session = handle.lock().await;
        session.now_playing().map(|now| now.track.clone())
    }

    /// Appends `track_ref` to the guild queue, creating the catalog track
    /// first when needed. Does not start playback.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        track_ref: &TrackRef,
        added_by: &str,
    ) -> Result<Enqueued, PlaybackError> {
        let track = self.find_or_create(track_ref).await?;
        let handle = self.sessions.get_or_create(guild_id);
        let _session = handle.lock().await;
        let entry = self.catalog.append_queue(guild_id, track.id, added_by).await?;
        debug!(guild = %guild_id, entry = entry.id, track = track.id, "Enqueued");
        Ok(Enqueued { entry, track })
    }

    /// Connects and starts the queue head. A no-op while something is
    /// already playing.
    pub async fn play(&self, guild_id: GuildId, actor: &Actor) -> Result<PlayOutcome, PlaybackError> {
        let handle = self.sessions.get_or_create(guild_id);
        let token = {
            let mut session = handle.lock().await;
            session.remember_actor(&actor.name);
            if session.state() != PlaybackState::Idle {
                return Ok(PlayOutcome::AlreadyPlaying);
            }
            if self.catalog.queue_head(guild_id).await?.is_none() {
                return Ok(PlayOutcome::NothingToPlay);
            }

            session.set_state(PlaybackState::Connecting);
            if let Err(e) = self.sink.connect(guild_id, actor.voice_channel).await {
                session.set_state(PlaybackState::Idle);
                return Err(e);
            }
            METRICS.inc_connections();
            session.attach()
        };
        Ok(PlayOutcome::Advanced(self.advance(guild_id, token).await?))
    }

    /// Enqueues `track_ref` and plays. An idle guild's stale queue is
    /// cleared first so the requested track plays next.
    pub async fn play_query(
        &self,
        guild_id: GuildId,
        actor: &Actor,
        track_ref: &TrackRef,
    ) -> Result<(Enqueued, PlayOutcome), PlaybackError> {
        let track = self.find_or_create(track_ref).await?;
        let entry = {
            let handle = self.sessions.get_or_create(guild_id);
            let session = handle.lock().await;
            if session.state() == PlaybackState::Idle {
                let cleared = self.catalog.clear_queue(guild_id, None).await?;
                if cleared > 0 {
                    debug!(guild = %guild_id, "Cleared {} stale queue entries", cleared);
                }
            }
            self.catalog.append_queue(guild_id, track.id, &actor.name).await?
        };
        let outcome = self.play(guild_id, actor).await?;
        Ok((Enqueued { entry, track }, outcome))
    }

    /// Stops the live source; the completion then advances the queue.
    pub async fn skip(&self, guild_id: GuildId) -> Result<Track, PlaybackError> {
        let handle = self.sessions.get_or_create(guild_id);
        let session = handle.lock().await;
        session.require_transport()?;
        let now = session
            .now_playing()
            .ok_or_else(|| PlaybackError::NotFound("nothing is playing".to_string()))?;
        info!(guild = %guild_id, entry = now.entry.id, "Skipping {}", now.track.name);
        now.stop();
        Ok(now.track.clone())
    }

    /// Removes the entry at 1-based `position`. The playing entry is
    /// skipped instead of being deleted under the sink.
    pub async fn remove(&self, guild_id: GuildId, position: usize) -> Result<Removed, PlaybackError> {
        if position == 0 {
            return Err(PlaybackError::InvalidInput("queue positions start at 1".to_string()));
        }
        let handle = self.sessions.get_or_create(guild_id);
        let session = handle.lock().await;
        let entry = self
            .catalog
            .list_queue(guild_id)
            .await?
            .into_iter()
            .nth(position - 1)
            .ok_or_else(|| PlaybackError::NotFound(format!("queue position {position}")))?;

        if let Some(now) = session.now_playing()
            && now.entry.id == entry.id
        {
            now.stop();
            return Ok(Removed::Skipped {
                track: now.track.clone(),
            });
        }

        let track = self.catalog.find_track(&TrackRef::Id(entry.track_id)).await?;
        self.catalog.remove_queue_entry(entry.id).await?;
        Ok(Removed::Dequeued { entry, track })
    }

    /// Disconnects. The interrupted entry counts as played; the rest of the
    /// queue stays for a later `play`.
    pub async fn stop(&self, guild_id: GuildId) -> Result<Option<Track>, PlaybackError> {
        let handle = self.sessions.get_or_create(guild_id);
        let mut session = handle.lock().await;
        session.require_transport()?;

        let interrupted = session.take_now_playing();
        if let Some(now) = &interrupted {
            now.stop();
        }
        self.release(&mut session).await;
        info!(guild = %guild_id, "Stopped playback");

        match interrupted {
            Some(now) => {
                self.catalog.remove_queue_entry(now.entry.id).await?;
                Ok(Some(now.track))
            }
            None => Ok(None),
        }
    }

    /// Removes every entry except the one playing. Returns how many went.
    pub async fn clear_queue(&self, guild_id: GuildId) -> Result<usize, PlaybackError> {
        let handle = self.sessions.get_or_create(guild_id);
        let session = handle.lock().await;
        let keep = session.now_playing().map(|now| now.entry.id);
        Ok(self.catalog.clear_queue(guild_id, keep).await?)
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<Track, PlaybackError> {
        let handle = self.sessions.get_or_create(guild_id);
        let mut session = handle.lock().await;
        Ok(session.pause()?.track.clone())
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<Track, PlaybackError> {
        let handle = self.sessions.get_or_create(guild_id);
        let mut session = handle.lock().await;
        Ok(session.resume()?.track.clone())
    }

    pub async fn volume(&self, guild_id: GuildId) -> i32 {
        let handle = self.sessions.get_or_create(guild_id);
        let session = handle.lock().await;
        session.volume_percent()
    }

    pub async fn set_volume(&self, guild_id: GuildId, percent: i32) -> i32 {
        let handle = self.sessions.get_or_create(guild_id);
        let mut session = handle.lock().await;
        session.set_volume(percent)
    }

    pub async fn adjust_volume(&self, guild_id: GuildId, delta: i32) -> i32 {
        let handle = self.sessions.get_or_create(guild_id);
        let mut session = handle.lock().await;
        let target = session.volume_percent().saturating_add(delta);
        session.set_volume(target)
    }

    pub async fn queue(&self, guild_id: GuildId) -> Result<Vec<QueueLine>, PlaybackError> {
        let handle = self.sessions.get_or_create(guild_id);
        let session = handle.lock().await;
        let playing = session.now_playing().map(|now| now.entry.id);

        let mut lines = Vec::new();
        for (idx, entry) in self.catalog.list_queue(guild_id).await?.into_iter().enumerate() {
            let track = self.catalog.find_track(&TrackRef::Id(entry.track_id)).await?;
            lines.push(QueueLine {
                position: idx + 1,
                playing: playing == Some(entry.id),
                entry,
                track,
            });
        }
        Ok(lines)
    }

    pub async fn history(
        &self,
        guild_id: GuildId,
        limit: i64,
    ) -> Result<Vec<(PlaybackRecord, Option<Track>)>, PlaybackError> {
        let mut out = Vec::new();
        for record in self.catalog.recent_history(guild_id, limit).await? {
            let track = self.catalog.find_track(&TrackRef::Id(record.track_id)).await?;
            out.push((record, track));
        }
        Ok(out)
    }

    /// Resolves and saves a track without queueing it.
    pub async fn add_track(&self, track_ref: &TrackRef) -> Result<Track, PlaybackError> {
        let query = match track_ref {
            TrackRef::Id(id) => {
                return Err(PlaybackError::InvalidInput(format!(
                    "#{id} is a catalog id, give a link or search terms"
                )));
            }
            TrackRef::Url(url) if !self.resolver.validate(url) => {
                return Err(PlaybackError::InvalidInput(format!("{url} is not a valid link")));
            }
            other => other.to_string(),
        };
        let resolved = self.resolver.resolve(&query).await?;
        let track = self.catalog.insert_track(resolved.to_draft()).await?;
        info!(track = track.id, "Added {} to the catalog", track.name);
        Ok(track)
    }

    pub async fn delete_track(&self, id: i32) -> Result<(), PlaybackError> {
        if self.catalog.delete_track(id).await? {
            info!(track = id, "Deleted track");
            Ok(())
        } else {
            Err(PlaybackError::NotFound(format!("track #{id}")))
        }
    }

    pub async fn list_tracks(&self, keywords: &[String]) -> Result<Vec<Track>, PlaybackError> {
        Ok(self.catalog.list_tracks(keywords).await?)
    }

    /// Adds every audio file below `dir` as a local track.
    pub async fn import_directory(&self, dir: &Path) -> Result<ImportSummary, PlaybackError> {
        if !dir.is_dir() {
            return Err(PlaybackError::NotFound(format!("{} is not a directory", dir.display())));
        }
        let root = dir.to_path_buf();
        let drafts = tokio::task::spawn_blocking(move || collect_audio_files(&root))
            .await
            .map_err(CatalogError::from)?;

        let mut summary = ImportSummary::default();
        for draft in drafts {
            match self.catalog.insert_track(draft).await {
                Ok(_) => summary.added += 1,
                Err(CatalogError::Duplicate { .. }) => summary.duplicates += 1,
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            "Imported {} track(s) from {} ({} already known)",
            summary.added,
            dir.display(),
            summary.duplicates
        );
        Ok(summary)
    }

    /// The bot left voice without `stop`, e.g. it was kicked from the
    /// channel. Drops the connection and leaves the queue untouched, so the
    /// interrupted entry plays again on the next `play`. Returns whether a
    /// connection was attached.
    pub async fn on_disconnected(&self, guild_id: GuildId) -> bool {
        let Some(handle) = self.sessions.get(guild_id) else {
            return false;
        };
        let mut session = handle.lock().await;
        if session.take_expected_leave() {
            debug!(guild = %guild_id, "Voice leave confirmed");
            return false;
        }
        if session.transport().is_none() {
            return false;
        }
        if let Some(now) = session.take_now_playing() {
            now.stop();
        }
        session.set_state(PlaybackState::Disconnecting);
        // drops the sink's stale call; no echo follows for it
        self.sink.disconnect(guild_id).await;
        Self::detach(&mut session);
        info!(guild = %guild_id, "Voice connection lost, playback dropped");
        true
    }

    /// Handles a completion reported by the sink. Completions that do not
    /// belong to the live playback are ignored; whoever ended it (`stop`,
    /// a lost connection) already settled its entry.
    pub async fn on_finished(&self, completion: Completion) -> Result<Option<AdvanceReport>, PlaybackError> {
        let guild_id = completion.guild_id;
        let handle = self.sessions.get_or_create(guild_id);
        let token = {
            let mut session = handle.lock().await;
            if session.now_playing().map(|now| now.play_id) != Some(completion.play_id) {
                debug!(guild = %guild_id, entry = completion.entry_id, "Ignoring stale completion");
                return Ok(None);
            }

            session.take_now_playing();
            match &completion.error {
                Some(err) => warn!(guild = %guild_id, entry = completion.entry_id, "Playback ended with error: {}", err),
                None => debug!(guild = %guild_id, entry = completion.entry_id, "Playback finished"),
            }
            if let Err(e) = self.catalog.remove_queue_entry(completion.entry_id).await {
                self.release(&mut session).await;
                return Err(e.into());
            }
            match session.transport() {
                Some(token) => token,
                None => return Ok(None),
            }
        };
        self.advance(guild_id, token).await.map(Some)
    }

    async fn advance(&self, guild_id: GuildId, token: TransportHandle) -> Result<AdvanceReport, PlaybackError> {
        let result = self.advance_inner(guild_id, token).await;
        if result.is_err() {
            let handle = self.sessions.get_or_create(guild_id);
            let mut session = handle.lock().await;
            if session.transport() == Some(token) && session.now_playing().is_none() {
                self.release(&mut session).await;
            }
        }
        result
    }

    async fn advance_inner(
        &self,
        guild_id: GuildId,
        token: TransportHandle,
    ) -> Result<AdvanceReport, PlaybackError> {
        let handle = self.sessions.get_or_create(guild_id);
        let mut skipped = Vec::new();
        loop {
            let entry = {
                let mut session = handle.lock().await;
                if session.transport() != Some(token) {
                    return Ok(AdvanceReport::new(AdvanceOutcome::Cancelled, skipped));
                }
                if session.now_playing().is_some() {
                    return Ok(AdvanceReport::new(AdvanceOutcome::AlreadyPlaying, skipped));
                }
                match self.catalog.queue_head(guild_id).await? {
                    Some(entry) => entry,
                    None => {
                        info!(guild = %guild_id, "Queue finished, leaving voice");
                        self.release(&mut session).await;
                        return Ok(AdvanceReport::new(AdvanceOutcome::Exhausted, skipped));
                    }
                }
            };

            let prepared = self.prepare(&entry).await;

            let mut session = handle.lock().await;
            if session.transport() != Some(token) {
                debug!(guild = %guild_id, entry = entry.id, "Connection released while resolving, discarding");
                return Ok(AdvanceReport::new(AdvanceOutcome::Cancelled, skipped));
            }
            if session.now_playing().is_some() {
                return Ok(AdvanceReport::new(AdvanceOutcome::AlreadyPlaying, skipped));
            }
            if self.catalog.queue_head(guild_id).await?.map(|head| head.id) != Some(entry.id) {
                debug!(guild = %guild_id, entry = entry.id, "Queue head changed while resolving");
                continue;
            }

            let failure = match prepared {
                Ok((track, source)) => {
                    let play_id = self.play_ids.fetch_add(1, Ordering::Relaxed) + 1;
                    let hook = self.bridge.hook(guild_id, entry.id, play_id);
                    match self.sink.start(guild_id, source, session.gain() as f32, hook).await {
                        Ok(active) => {
                            session.begin(NowPlaying::new(entry.clone(), track.clone(), play_id, active));
                            METRICS.inc_tracks_started();
                            info!(guild = %guild_id, entry = entry.id, track = track.id, "Playing {}", track.name);
                            self.record_history(&session, &track).await;
                            return Ok(AdvanceReport::new(
                                AdvanceOutcome::Started { entry, track },
                                skipped,
                            ));
                        }
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            warn!(guild = %guild_id, entry = entry.id, "Skipping unplayable queue entry: {}", failure);
            self.catalog.remove_queue_entry(entry.id).await?;
            METRICS.inc_entries_skipped();
            skipped.push(SkippedEntry {
                entry,
                error: failure,
            });
            if !self.policy.allows_retry(skipped.len()) {
                info!(guild = %guild_id, "Giving up after {} unplayable entries", skipped.len());
                self.release(&mut session).await;
                return Ok(AdvanceReport::new(AdvanceOutcome::Halted, skipped));
            }
        }
    }

    /// Produces a fresh source for `entry`. Streaming sources expire, so
    /// linked tracks are resolved again for every play.
    async fn prepare(&self, entry: &QueueEntry) -> Result<(Track, PlayableSource), PlaybackError> {
        let track = self
            .catalog
            .find_track(&TrackRef::Id(entry.track_id))
            .await?
            .ok_or_else(|| {
                PlaybackError::NotFound(format!(
                    "track #{} of queue entry {} was deleted",
                    entry.track_id, entry.id
                ))
            })?;

        let source = match (&track.url, &track.filename) {
            (Some(url), _) => PlayableSource::Stream {
                uri: self.resolver.resolve(url).await?.source_uri,
            },
            (None, Some(filename)) => {
                let path = self.music_dir.join(filename);
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(PlaybackError::SourceUnavailable(format!(
                        "{} is missing",
                        path.display()
                    )));
                }
                PlayableSource::File(path)
            }
            (None, None) => {
                return Err(PlaybackError::SourceUnavailable(format!(
                    "track #{} has neither link nor file",
                    track.id
                )));
            }
        };
        Ok((track, source))
    }

    async fn record_history(&self, session: &GuildSession, track: &Track) {
        let user = session.last_actor().unwrap_or("unknown");
        if let Err(e) = self
            .catalog
            .append_history(track.id, user, session.guild_id(), Utc::now().naive_utc())
            .await
        {
            warn!(guild = %session.guild_id(), track = track.id, "Failed to record history: {}", e);
        }
    }

    async fn release(&self, session: &mut GuildSession) {
        session.set_state(PlaybackState::Disconnecting);
        if self.sink.disconnect(session.guild_id()).await {
            session.expect_leave();
        }
        Self::detach(session);
    }

    fn detach(session: &mut GuildSession) {
        if session.detach().is_some() {
            METRICS.dec_connections();
        }
        session.set_state(PlaybackState::Idle);
    }

    async fn find_or_create(&self, track_ref: &TrackRef) -> Result<Track, PlaybackError> {
        match track_ref {
            TrackRef::Id(id) => self
                .catalog
                .find_track(track_ref)
                .await?
                .ok_or_else(|| PlaybackError::NotFound(format!("track #{id}"))),
            TrackRef::Url(url) => {
                if !self.resolver.validate(url) {
                    return Err(PlaybackError::InvalidInput(format!("{url} is not a valid link")));
                }
                match self.catalog.find_track(track_ref).await? {
                    Some(track) => Ok(track),
                    None => self.resolve_and_insert(url).await,
                }
            }
            TrackRef::Search(_) => match self.catalog.find_track(track_ref).await? {
                Some(track) => Ok(track),
                None => self.resolve_and_insert(&track_ref.to_string()).await,
            },
        }
    }

    async fn resolve_and_insert(&self, query: &str) -> Result<Track, PlaybackError> {
        let resolved = self.resolver.resolve(query).await?;
        match self.catalog.insert_track(resolved.to_draft()).await {
            Ok(track) => Ok(track),
            Err(CatalogError::Duplicate { existing }) => Ok(*existing),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CompletionTarget for Orchestrator {
    async fn on_finished(&self, completion: Completion) -> Result<(), PlaybackError> {
        Orchestrator::on_finished(self, completion).await.map(|_| ())
    }
}

fn collect_audio_files(root: &Path) -> Vec<TrackDraft> {
    let mut drafts = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path during import: {}", e);
                continue;
            }
        };
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !entry.file_type().is_file() || !is_audio {
            continue;
        }
        let (Ok(relative), Some(stem)) = (path.strip_prefix(root), path.file_stem()) else {
            continue;
        };
        drafts.push(TrackDraft {
            name: stem.to_string_lossy().into_owned(),
            url: None,
            filename: Some(relative.to_string_lossy().into_owned()),
            duration: None,
        });
    }
    drafts
}
