//! Fakes and fixtures shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::all::{ChannelId, GuildId};
use tokio::sync::{Notify, Semaphore};

use crate::bridge::FinishHook;
use crate::database::models::{QueueEntry, Track};
use crate::error::PlaybackError;
use crate::resolver::{ResolveError, ResolvedTrack, TrackResolver};
use crate::sink::{ActiveSource, PlayableSource, PlaybackSink};

pub fn track(id: i32) -> Track {
    Track {
        id,
        name: format!("Track {id}"),
        url: Some(format!("https://youtu.be/{id}")),
        filename: None,
        duration: None,
        created_at: chrono::NaiveDateTime::default(),
    }
}

pub fn queue_entry(id: i32, track_id: i32) -> QueueEntry {
    QueueEntry {
        id,
        guild_id: "1".into(),
        track_id,
        position: id,
        added_by: "tester".into(),
        added_at: chrono::NaiveDateTime::default(),
    }
}

/// Polls `check` until it holds, failing the test after five seconds.
pub async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceCall {
    Gain(f32),
    Pause,
    Resume,
    Stop,
}

/// A source that only records what was asked of it.
pub struct FakeSource {
    calls: Arc<Mutex<Vec<SourceCall>>>,
}

impl FakeSource {
    pub fn new() -> (Self, Arc<Mutex<Vec<SourceCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl ActiveSource for FakeSource {
    fn set_gain(&self, gain: f32) {
        self.calls.lock().push(SourceCall::Gain(gain));
    }
    fn pause(&self) {
        self.calls.lock().push(SourceCall::Pause);
    }
    fn resume(&self) {
        self.calls.lock().push(SourceCall::Resume);
    }
    fn stop(&self) {
        self.calls.lock().push(SourceCall::Stop);
    }
}

/// One `start` seen by [`FakeSink`].
pub struct StartedSource {
    pub guild_id: GuildId,
    pub source: PlayableSource,
    pub gain: f32,
    calls: Mutex<Vec<SourceCall>>,
    hook: Mutex<Option<FinishHook>>,
    ended: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl StartedSource {
    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().clone()
    }

    fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Ends the source as the voice driver would and waits for the hook.
    pub async fn finish(&self, error: Option<String>) -> Result<(), PlaybackError> {
        self.end();
        let Some(hook) = self.hook.lock().take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || hook.finish(error))
            .await
            .unwrap()
    }
}

struct FakeHandle(Arc<StartedSource>);

impl ActiveSource for FakeHandle {
    fn set_gain(&self, gain: f32) {
        self.0.calls.lock().push(SourceCall::Gain(gain));
    }
    fn pause(&self) {
        self.0.calls.lock().push(SourceCall::Pause);
    }
    fn resume(&self) {
        self.0.calls.lock().push(SourceCall::Resume);
    }
    fn stop(&self) {
        self.0.calls.lock().push(SourceCall::Stop);
        self.0.end();
        if let Some(hook) = self.0.hook.lock().take() {
            std::thread::spawn(move || {
                let _ = hook.finish(None);
            });
        }
    }
}

/// In-memory sink. Completions are fired from plain threads, outside the
/// runtime, the way the voice driver does it.
#[derive(Default)]
pub struct FakeSink {
    started: Mutex<Vec<Arc<StartedSource>>>,
    connects: Mutex<Vec<(GuildId, ChannelId)>>,
    disconnects: Mutex<Vec<GuildId>>,
    live: Arc<AtomicUsize>,
    max_live: AtomicUsize,
}

impl FakeSink {
    pub fn started(&self, idx: usize) -> Arc<StartedSource> {
        Arc::clone(&self.started.lock()[idx])
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().len()
    }

    pub fn connects(&self) -> Vec<(GuildId, ChannelId)> {
        self.connects.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<GuildId> {
        self.disconnects.lock().clone()
    }

    /// Highest number of sources that were live at the same time.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackSink for FakeSink {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel: Option<ChannelId>,
    ) -> Result<(), PlaybackError> {
        let channel = channel.ok_or(PlaybackError::NotConnected)?;
        self.connects.lock().push((guild_id, channel));
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> bool {
        self.disconnects.lock().push(guild_id);
        true
    }

    async fn start(
        &self,
        guild_id: GuildId,
        source: PlayableSource,
        gain: f32,
        on_finish: FinishHook,
    ) -> Result<Box<dyn ActiveSource>, PlaybackError> {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        let started = Arc::new(StartedSource {
            guild_id,
            source,
            gain,
            calls: Mutex::new(Vec::new()),
            hook: Mutex::new(Some(on_finish)),
            ended: AtomicBool::new(false),
            live: Arc::clone(&self.live),
        });
        self.started.lock().push(Arc::clone(&started));
        Ok(Box::new(FakeHandle(started)))
    }
}

/// Lets a test hold resolutions of chosen links until it releases them.
#[derive(Clone)]
pub struct Gate {
    entered: Arc<Notify>,
    open: Arc<Semaphore>,
}

impl Gate {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.open.add_permits(1024);
    }
}

/// Resolver that answers from memory. Links in `failing` are unavailable;
/// links in `held` wait for the [`Gate`].
pub struct FakeResolver {
    failing: Vec<String>,
    held: Vec<String>,
    gate: Gate,
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self {
            failing: Vec::new(),
            held: Vec::new(),
            gate: Gate {
                entered: Arc::new(Notify::new()),
                open: Arc::new(Semaphore::new(0)),
            },
        }
    }
}

impl FakeResolver {
    pub fn failing(urls: &[&str]) -> Self {
        Self {
            failing: urls.iter().map(|u| u.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn holding(urls: &[&str]) -> Self {
        Self {
            held: urls.iter().map(|u| u.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn gate(&self) -> Gate {
        self.gate.clone()
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    fn validate(&self, url: &str) -> bool {
        url.starts_with("https://") || url.starts_with("http://")
    }

    async fn resolve(&self, url_or_query: &str) -> Result<ResolvedTrack, ResolveError> {
        if self.held.iter().any(|u| u == url_or_query) {
            self.gate.entered.notify_one();
            if let Ok(permit) = self.gate.open.acquire().await {
                permit.forget();
            }
        }
        if self.failing.iter().any(|u| u == url_or_query) {
            return Err(ResolveError::Unavailable {
                target: url_or_query.to_string(),
                reason: "video unavailable".into(),
            });
        }
        let canonical_url = if self.validate(url_or_query) {
            url_or_query.to_string()
        } else {
            format!("https://youtu.be/{}", url_or_query.replace(' ', "-"))
        };
        Ok(ResolvedTrack {
            name: url_or_query.rsplit('/').next().unwrap_or(url_or_query).to_string(),
            source_uri: format!("stream:{canonical_url}"),
            canonical_url,
            duration: Some(Duration::from_secs(180)),
        })
    }
}
