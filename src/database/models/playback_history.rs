use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::playback_history;

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = playback_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PlaybackRecord {
    pub id: i32,
    pub track_id: i32,
    pub user_name: String,
    pub guild_id: String,
    pub played_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = playback_history)]
pub struct NewPlaybackRecord<'a> {
    pub track_id: i32,
    pub user_name: &'a str,
    pub guild_id: &'a str,
    pub played_at: NaiveDateTime,
}

impl PlaybackRecord {
    pub fn create(
        conn: &mut SqliteConnection,
        track_id: i32,
        user_name: &str,
        guild_id: &str,
        played_at: NaiveDateTime,
    ) -> QueryResult<usize> {
        diesel::insert_into(playback_history::table)
            .values(&NewPlaybackRecord {
                track_id,
                user_name,
                guild_id,
                played_at,
            })
            .execute(conn)
    }

    pub fn get_recent_for_guild(
        conn: &mut SqliteConnection,
        guild_id: &str,
        limit: i64,
    ) -> QueryResult<Vec<PlaybackRecord>> {
        playback_history::table
            .filter(playback_history::guild_id.eq(guild_id))
            .order((playback_history::played_at.desc(), playback_history::id.desc()))
            .limit(limit)
            .select(PlaybackRecord::as_select())
            .load(conn)
    }
}
