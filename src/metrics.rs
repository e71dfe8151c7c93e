use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    time::Instant,
};

use once_cell::sync::Lazy;

pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| Arc::new(Metrics::new()));

#[derive(Debug)]
pub struct Metrics {
    start: Instant,
    ready: AtomicBool,
    connected_guilds: AtomicUsize,
    tracks_started: AtomicU64,
    entries_skipped: AtomicU64,
    callback_timeouts: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            ready: AtomicBool::new(false),
            connected_guilds: AtomicUsize::new(0),
            tracks_started: AtomicU64::new(0),
            entries_skipped: AtomicU64::new(0),
            callback_timeouts: AtomicU64::new(0),
        }
    }

    pub fn set_ready(&self, v: bool) {
        self.ready.store(v, Ordering::Relaxed);
    }
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn inc_connections(&self) {
        self.connected_guilds.fetch_add(1, Ordering::Relaxed);
    }
    pub fn dec_connections(&self) {
        let _ = self
            .connected_guilds
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
    }

    pub fn inc_tracks_started(&self) {
        self.tracks_started.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_entries_skipped(&self) {
        self.entries_skipped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_callback_timeouts(&self) {
        self.callback_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start.elapsed().as_secs(),
            ready: self.is_ready(),
            connected_guilds: self.connected_guilds.load(Ordering::Relaxed),
            tracks_started: self.tracks_started.load(Ordering::Relaxed),
            entries_skipped: self.entries_skipped.load(Ordering::Relaxed),
            callback_timeouts: self.callback_timeouts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub ready: bool,
    pub connected_guilds: usize,
    pub tracks_started: u64,
    pub entries_skipped: u64,
    pub callback_timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_gauge_never_underflows() {
        let metrics = Metrics::new();
        metrics.dec_connections();
        metrics.inc_connections();
        metrics.inc_connections();
        metrics.dec_connections();
        assert_eq!(metrics.snapshot().connected_guilds, 1);
    }
}
