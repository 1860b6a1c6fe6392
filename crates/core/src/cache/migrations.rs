//! Database schema migrations.
//!
//! Uses a version table to track which migrations have been applied.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Schema versions, ascending. Each script must be safe to replay.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_blobs.sql"))];

/// Bring the schema up to the latest version.
///
/// Each pending script runs in its own transaction together with its
/// version row, so an interrupted open never records a half-applied schema.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            tracing::debug!(version, "applying schema migration");
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
