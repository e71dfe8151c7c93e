use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::tracks;

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = tracks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Track {
    pub id: i32,
    pub name: String,
    pub url: Option<String>,
    pub filename: Option<String>,
    pub duration: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone, Copy)]
#[diesel(table_name = tracks)]
pub struct NewTrack<'a> {
    pub name: &'a str,
    pub url: Option<&'a str>,
    pub filename: Option<&'a str>,
    pub duration: Option<i32>,
}

impl Track {
    pub fn create(conn: &mut SqliteConnection, new_track: &NewTrack<'_>) -> QueryResult<Track> {
        diesel::insert_into(tracks::table)
            .values(new_track)
            .returning(Track::as_returning())
            .get_result(conn)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Track>> {
        tracks::table
            .find(id)
            .select(Track::as_select())
            .first(conn)
            .optional()
    }

    pub fn find_by_url(conn: &mut SqliteConnection, url: &str) -> QueryResult<Option<Track>> {
        tracks::table
            .filter(tracks::url.eq(url))
            .select(Track::as_select())
            .first(conn)
            .optional()
    }

    pub fn find_by_filename(
        conn: &mut SqliteConnection,
        filename: &str,
    ) -> QueryResult<Option<Track>> {
        tracks::table
            .filter(tracks::filename.eq(filename))
            .select(Track::as_select())
            .first(conn)
            .optional()
    }

    /// Tracks whose name contains every keyword, in the given order.
    /// SQLite `LIKE` is case-insensitive for ASCII.
    pub fn search(
        conn: &mut SqliteConnection,
        keywords: &[String],
        limit: Option<i64>,
    ) -> QueryResult<Vec<Track>> {
        let pattern = format!("%{}%", keywords.join("%"));
        let query = tracks::table
            .filter(tracks::name.like(pattern))
            .order(tracks::id.asc())
            .select(Track::as_select());
        match limit {
            Some(n) => query.limit(n).load(conn),
            None => query.load(conn),
        }
    }

    pub fn list_all(conn: &mut SqliteConnection) -> QueryResult<Vec<Track>> {
        tracks::table
            .order(tracks::id.asc())
            .select(Track::as_select())
            .load(conn)
    }

    pub fn delete(conn: &mut SqliteConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(tracks::table.find(id)).execute(conn)
    }
}
