pub mod models;
pub mod schema;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::catalog::CatalogError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Opens the SQLite catalog at `database_url` and brings its schema up to date.
pub fn establish_connection(database_url: &str) -> Result<SqliteConnection, CatalogError> {
    let mut conn = SqliteConnection::establish(database_url)?;
    conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL;")?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| CatalogError::Migration(e.to_string()))?;
    if !applied.is_empty() {
        info!("Applied {} catalog migration(s) to {}", applied.len(), database_url);
    }
    Ok(conn)
}
