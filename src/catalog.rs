use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::SqliteConnection;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use parking_lot::Mutex;
use serenity::all::GuildId;
use thiserror::Error;

use crate::database::establish_connection;
use crate::database::models::{NewTrack, PlaybackRecord, QueueEntry, Track};
use crate::error::PlaybackError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("a track with this source is already in the catalog (#{})", .existing.id)]
    Duplicate { existing: Box<Track> },

    #[error(transparent)]
    Storage(#[from] DieselError),

    #[error("cannot open catalog: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("catalog migration failed: {0}")]
    Migration(String),

    #[error("catalog worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// How a user refers to a track: a catalog id, a URL, or free-text search
/// terms. Parsed once where user input enters the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackRef {
    Id(i32),
    Url(String),
    Search(Vec<String>),
}

impl TrackRef {
    pub fn parse(input: &str) -> Result<Self, PlaybackError> {
        let words: Vec<String> = input.split_whitespace().map(str::to_string).collect();
        match words.as_slice() {
            [] => Err(PlaybackError::InvalidInput("nothing to look up".to_string())),
            [single] if single.chars().all(|c| c.is_ascii_digit()) => single
                .parse()
                .map(TrackRef::Id)
                .map_err(|_| PlaybackError::InvalidInput(format!("{single} is not a valid id"))),
            [single] if single.starts_with("http://") || single.starts_with("https://") => {
                Ok(TrackRef::Url(single.clone()))
            }
            _ => Ok(TrackRef::Search(words)),
        }
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackRef::Id(id) => write!(f, "#{id}"),
            TrackRef::Url(url) => f.write_str(url),
            TrackRef::Search(words) => f.write_str(&words.join(" ")),
        }
    }
}

/// Values for a track about to be inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackDraft {
    pub name: String,
    pub url: Option<String>,
    pub filename: Option<String>,
    pub duration: Option<i32>,
}

/// Durable storage of the track catalog, per-guild queues and play history.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Keyword lookups return the lowest-id match.
    async fn find_track(&self, track_ref: &TrackRef) -> Result<Option<Track>, CatalogError>;
    async fn list_tracks(&self, keywords: &[String]) -> Result<Vec<Track>, CatalogError>;
    /// Fails with [`CatalogError::Duplicate`] when the url or filename is taken.
    async fn insert_track(&self, draft: TrackDraft) -> Result<Track, CatalogError>;
    async fn delete_track(&self, id: i32) -> Result<bool, CatalogError>;

    async fn list_queue(&self, guild_id: GuildId) -> Result<Vec<QueueEntry>, CatalogError>;
    async fn queue_head(&self, guild_id: GuildId) -> Result<Option<QueueEntry>, CatalogError>;
    async fn append_queue(
        &self,
        guild_id: GuildId,
        track_id: i32,
        added_by: &str,
    ) -> Result<QueueEntry, CatalogError>;
    async fn remove_queue_entry(&self, id: i32) -> Result<bool, CatalogError>;
    /// Removes every entry of the guild except `keep`.
    async fn clear_queue(&self, guild_id: GuildId, keep: Option<i32>)
    -> Result<usize, CatalogError>;

    async fn append_history(
        &self,
        track_id: i32,
        user_name: &str,
        guild_id: GuildId,
        played_at: NaiveDateTime,
    ) -> Result<(), CatalogError>;
    async fn recent_history(
        &self,
        guild_id: GuildId,
        limit: i64,
    ) -> Result<Vec<PlaybackRecord>, CatalogError>;
}

/// Diesel/SQLite catalog. Statements run on the blocking pool against a
/// single shared connection.
#[derive(Clone)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<SqliteConnection>>,
}

impl SqliteCatalog {
    pub fn open(database_url: &str) -> Result<Self, CatalogError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(establish_connection(database_url)?)),
        })
    }

    pub fn in_memory() -> Result<Self, CatalogError> {
        Self::open(":memory:")
    }

    async fn run<T, F>(&self, f: F) -> Result<T, CatalogError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, CatalogError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await?
    }
}

fn insert_deduplicated(conn: &mut SqliteConnection, draft: &TrackDraft) -> Result<Track, CatalogError> {
    let new_track = NewTrack {
        name: &draft.name,
        url: draft.url.as_deref(),
        filename: draft.filename.as_deref(),
        duration: draft.duration,
    };
    match Track::create(conn, &new_track) {
        Ok(track) => Ok(track),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
            let by_url = match &draft.url {
                Some(url) => Track::find_by_url(conn, url)?,
                None => None,
            };
            let existing = match (by_url, &draft.filename) {
                (Some(track), _) => Some(track),
                (None, Some(filename)) => Track::find_by_filename(conn, filename)?,
                (None, None) => None,
            };
            match existing {
                Some(existing) => Err(CatalogError::Duplicate {
                    existing: Box::new(existing),
                }),
                None => Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info).into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn find_track(&self, track_ref: &TrackRef) -> Result<Option<Track>, CatalogError> {
        let track_ref = track_ref.clone();
        self.run(move |conn| {
            Ok(match &track_ref {
                TrackRef::Id(id) => Track::find_by_id(conn, *id)?,
                TrackRef::Url(url) => Track::find_by_url(conn, url)?,
                TrackRef::Search(words) => Track::search(conn, words, Some(1))?.into_iter().next(),
            })
        })
        .await
    }

    async fn list_tracks(&self, keywords: &[String]) -> Result<Vec<Track>, CatalogError> {
        let keywords = keywords.to_vec();
        self.run(move |conn| {
            Ok(if keywords.is_empty() {
                Track::list_all(conn)?
            } else {
                Track::search(conn, &keywords, None)?
            })
        })
        .await
    }

    async fn insert_track(&self, draft: TrackDraft) -> Result<Track, CatalogError> {
        self.run(move |conn| insert_deduplicated(conn, &draft)).await
    }

    async fn delete_track(&self, id: i32) -> Result<bool, CatalogError> {
        self.run(move |conn| Ok(Track::delete(conn, id)? > 0)).await
    }

    async fn list_queue(&self, guild_id: GuildId) -> Result<Vec<QueueEntry>, CatalogError> {
        let guild = guild_id.to_string();
        self.run(move |conn| Ok(QueueEntry::get_guild_queue(conn, &guild)?))
            .await
    }

    async fn queue_head(&self, guild_id: GuildId) -> Result<Option<QueueEntry>, CatalogError> {
        let guild = guild_id.to_string();
        self.run(move |conn| Ok(QueueEntry::head(conn, &guild)?)).await
    }

    async fn append_queue(
        &self,
        guild_id: GuildId,
        track_id: i32,
        added_by: &str,
    ) -> Result<QueueEntry, CatalogError> {
        let guild = guild_id.to_string();
        let added_by = added_by.to_string();
        self.run(move |conn| Ok(QueueEntry::append(conn, &guild, track_id, &added_by)?))
            .await
    }

    async fn remove_queue_entry(&self, id: i32) -> Result<bool, CatalogError> {
        self.run(move |conn| Ok(QueueEntry::delete(conn, id)? > 0))
            .await
    }

    async fn clear_queue(
        &self,
        guild_id: GuildId,
        keep: Option<i32>,
    ) -> Result<usize, CatalogError> {
        let guild = guild_id.to_string();
        self.run(move |conn| Ok(QueueEntry::clear_guild(conn, &guild, keep)?))
            .await
    }

    async fn append_history(
        &self,
        track_id: i32,
        user_name: &str,
        guild_id: GuildId,
        played_at: NaiveDateTime,
    ) -> Result<(), CatalogError> {
        let guild = guild_id.to_string();
        let user_name = user_name.to_string();
        self.run(move |conn| {
            PlaybackRecord::create(conn, track_id, &user_name, &guild, played_at)?;
            Ok(())
        })
        .await
    }

    async fn recent_history(
        &self,
        guild_id: GuildId,
        limit: i64,
    ) -> Result<Vec<PlaybackRecord>, CatalogError> {
        let guild = guild_id.to_string();
        self.run(move |conn| Ok(PlaybackRecord::get_recent_for_guild(conn, &guild, limit)?))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn guild() -> GuildId {
        GuildId::new(42)
    }

    fn draft(name: &str, url: &str) -> TrackDraft {
        TrackDraft {
            name: name.to_string(),
            url: Some(url.to_string()),
            ..TrackDraft::default()
        }
    }

    #[test]
    fn parses_track_references() {
        assert_eq!(TrackRef::parse("17").unwrap(), TrackRef::Id(17));
        assert_eq!(
            TrackRef::parse("  https://youtu.be/abc ").unwrap(),
            TrackRef::Url("https://youtu.be/abc".into())
        );
        assert_eq!(
            TrackRef::parse("never gonna give").unwrap(),
            TrackRef::Search(vec!["never".into(), "gonna".into(), "give".into()])
        );
        assert!(matches!(
            TrackRef::parse("   "),
            Err(PlaybackError::InvalidInput(_))
        ));
        assert!(matches!(
            TrackRef::parse("99999999999999"),
            Err(PlaybackError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_url_returns_original_track() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let first = catalog
            .insert_track(draft("Original", "https://youtu.be/dup"))
            .await
            .unwrap();

        let err = catalog
            .insert_track(draft("Copy", "https://youtu.be/dup"))
            .await
            .unwrap_err();

        match err {
            CatalogError::Duplicate { existing } => assert_eq!(*existing, first),
            other => panic!("expected Duplicate, got {other:?}"),
        }
        assert_eq!(catalog.list_tracks(&[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_filename_is_detected() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let local = TrackDraft {
            name: "Local".into(),
            filename: Some("a/b.mp3".into()),
            ..TrackDraft::default()
        };
        let first = catalog.insert_track(local.clone()).await.unwrap();
        let err = catalog.insert_track(local).await.unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate { existing } if existing.id == first.id));
    }

    #[tokio::test]
    async fn finds_tracks_by_id_url_and_keywords() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let a = catalog
            .insert_track(draft("Kino - Gruppa Krovi", "https://youtu.be/a"))
            .await
            .unwrap();
        let b = catalog
            .insert_track(draft("Kino - Zvezda", "https://youtu.be/b"))
            .await
            .unwrap();

        let by_id = catalog.find_track(&TrackRef::Id(b.id)).await.unwrap();
        assert_eq!(by_id, Some(b.clone()));

        let by_url = catalog
            .find_track(&TrackRef::Url("https://youtu.be/a".into()))
            .await
            .unwrap();
        assert_eq!(by_url, Some(a.clone()));

        let by_words = catalog
            .find_track(&TrackRef::Search(vec!["kino".into(), "zvezda".into()]))
            .await
            .unwrap();
        assert_eq!(by_words, Some(b));

        let listed = catalog.list_tracks(&["kino".to_string()]).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], a);

        assert!(catalog.delete_track(a.id).await.unwrap());
        assert_eq!(catalog.find_track(&TrackRef::Id(a.id)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn queue_is_fifo_per_guild() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let other = GuildId::new(7);
        let mut ids = Vec::new();
        for n in 0..3 {
            let track = catalog
                .insert_track(draft(&format!("T{n}"), &format!("https://youtu.be/{n}")))
                .await
                .unwrap();
            ids.push(catalog.append_queue(guild(), track.id, "tester").await.unwrap().track_id);
        }
        catalog.append_queue(other, ids[0], "someone").await.unwrap();

        let queue: Vec<i32> = catalog
            .list_queue(guild())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.track_id)
            .collect();
        assert_eq!(queue, ids);

        let head = catalog.queue_head(guild()).await.unwrap().unwrap();
        assert_eq!(head.track_id, ids[0]);
        assert!(catalog.remove_queue_entry(head.id).await.unwrap());
        assert!(!catalog.remove_queue_entry(head.id).await.unwrap());
        assert_eq!(catalog.queue_head(guild()).await.unwrap().unwrap().track_id, ids[1]);
        assert_eq!(catalog.list_queue(other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_keeps_requested_entry() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let track = catalog
            .insert_track(draft("T", "https://youtu.be/t"))
            .await
            .unwrap();
        let keep = catalog.append_queue(guild(), track.id, "a").await.unwrap();
        catalog.append_queue(guild(), track.id, "b").await.unwrap();
        catalog.append_queue(guild(), track.id, "c").await.unwrap();

        assert_eq!(catalog.clear_queue(guild(), Some(keep.id)).await.unwrap(), 2);
        assert_eq!(catalog.list_queue(guild()).await.unwrap(), vec![keep]);

        assert_eq!(catalog.clear_queue(guild(), None).await.unwrap(), 1);
        assert!(catalog.queue_head(guild()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let earlier = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let later = earlier + chrono::Duration::minutes(5);
        catalog.append_history(1, "alice", guild(), earlier).await.unwrap();
        catalog.append_history(2, "bob", guild(), later).await.unwrap();

        let recent = catalog.recent_history(guild(), 10).await.unwrap();
        let users: Vec<&str> = recent.iter().map(|r| r.user_name.as_str()).collect();
        assert_eq!(users, vec!["bob", "alice"]);
    }
}
