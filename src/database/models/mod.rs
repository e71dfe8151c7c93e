pub mod playback_history;
pub mod queue_entry;
pub mod track;

// Re-export all models for convenience
pub use playback_history::PlaybackRecord;
pub use queue_entry::QueueEntry;
pub use track::{NewTrack, Track};
