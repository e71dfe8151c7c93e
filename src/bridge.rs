//! Hands track completions from sink threads back to the async runtime.
//!
//! The sink reports "track ended" from its own context. The hook schedules
//! the handler on the runtime and waits for it a bounded amount of time.

use std::sync::Weak;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossbeam_channel::RecvTimeoutError;
use serenity::all::GuildId;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::error::PlaybackError;
use crate::metrics::METRICS;

/// A finished (or failed, or stopped) playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub guild_id: GuildId,
    pub entry_id: i32,
    pub play_id: u64,
    pub error: Option<String>,
}

#[async_trait]
pub trait CompletionTarget: Send + Sync {
    async fn on_finished(&self, completion: Completion) -> Result<(), PlaybackError>;
}

/// Builds [`FinishHook`]s bound to one runtime and one target.
#[derive(Clone)]
pub struct CompletionBridge {
    runtime: Handle,
    target: Weak<dyn CompletionTarget>,
    timeout: Duration,
}

impl CompletionBridge {
    pub fn new(runtime: Handle, target: Weak<dyn CompletionTarget>, timeout: Duration) -> Self {
        Self {
            runtime,
            target,
            timeout,
        }
    }

    pub fn hook(&self, guild_id: GuildId, entry_id: i32, play_id: u64) -> FinishHook {
        FinishHook {
            bridge: self.clone(),
            guild_id,
            entry_id,
            play_id,
        }
    }
}

/// One-shot completion callback handed to the sink with every start.
pub struct FinishHook {
    bridge: CompletionBridge,
    guild_id: GuildId,
    entry_id: i32,
    play_id: u64,
}

impl FinishHook {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Delivers the completion and blocks until it is handled. Must be
    /// called off the runtime's worker threads.
    pub fn finish(self, error: Option<String>) -> Result<(), PlaybackError> {
        let Some(target) = self.bridge.target.upgrade() else {
            debug!("Completion for guild {} dropped, orchestrator is gone", self.guild_id);
            return Ok(());
        };
        let completion = Completion {
            guild_id: self.guild_id,
            entry_id: self.entry_id,
            play_id: self.play_id,
            error,
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let started = Instant::now();
        self.bridge.runtime.spawn(async move {
            let result = target.on_finished(completion).await;
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.bridge.timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Completion handler for guild {} failed: {}", self.guild_id, e);
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                METRICS.inc_callback_timeouts();
                error!(
                    "Completion for guild {} (entry {}) not handled within {:?}",
                    self.guild_id, self.entry_id, self.bridge.timeout
                );
                Err(PlaybackError::CallbackTimeout {
                    guild_id: self.guild_id,
                    waited: self.bridge.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("Completion task for guild {} ended without a result", self.guild_id);
                Err(PlaybackError::CallbackTimeout {
                    guild_id: self.guild_id,
                    waited: started.elapsed(),
                })
            }
        }
    }
}
