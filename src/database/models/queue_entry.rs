use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::queue_entries;

/// One scheduled play of a track in a guild's queue. Rows are ordered by
/// `position` (insertion order) with ties broken by `id`.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = queue_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueEntry {
    pub id: i32,
    pub guild_id: String,
    pub track_id: i32,
    pub position: i32,
    pub added_by: String,
    pub added_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = queue_entries)]
pub struct NewQueueEntry<'a> {
    pub guild_id: &'a str,
    pub track_id: i32,
    pub position: i32,
    pub added_by: &'a str,
}

impl QueueEntry {
    pub fn get_guild_queue(
        conn: &mut SqliteConnection,
        guild_id: &str,
    ) -> QueryResult<Vec<QueueEntry>> {
        queue_entries::table
            .filter(queue_entries::guild_id.eq(guild_id))
            .order((queue_entries::position.asc(), queue_entries::id.asc()))
            .select(QueueEntry::as_select())
            .load(conn)
    }

    pub fn head(conn: &mut SqliteConnection, guild_id: &str) -> QueryResult<Option<QueueEntry>> {
        queue_entries::table
            .filter(queue_entries::guild_id.eq(guild_id))
            .order((queue_entries::position.asc(), queue_entries::id.asc()))
            .select(QueueEntry::as_select())
            .first(conn)
            .optional()
    }

    pub fn append(
        conn: &mut SqliteConnection,
        guild_id: &str,
        track_id: i32,
        added_by: &str,
    ) -> QueryResult<QueueEntry> {
        conn.immediate_transaction(|conn| {
            let next_position = queue_entries::table
                .filter(queue_entries::guild_id.eq(guild_id))
                .select(queue_entries::position)
                .order(queue_entries::position.desc())
                .first::<i32>(conn)
                .optional()?
                .map(|pos| pos + 1)
                .unwrap_or(0);

            diesel::insert_into(queue_entries::table)
                .values(&NewQueueEntry {
                    guild_id,
                    track_id,
                    position: next_position,
                    added_by,
                })
                .returning(QueueEntry::as_returning())
                .get_result(conn)
        })
    }

    pub fn delete(conn: &mut SqliteConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(queue_entries::table.find(id)).execute(conn)
    }

    /// Deletes every row of the guild except `keep`, if given.
    pub fn clear_guild(
        conn: &mut SqliteConnection,
        guild_id: &str,
        keep: Option<i32>,
    ) -> QueryResult<usize> {
        let rows = queue_entries::table.filter(queue_entries::guild_id.eq(guild_id));
        match keep {
            Some(id) => diesel::delete(rows.filter(queue_entries::id.ne(id))).execute(conn),
            None => diesel::delete(rows).execute(conn),
        }
    }
}
