//! Blob CRUD operations on the SQLite store.

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::store::BlobStore;
use crate::Error;

#[async_trait]
impl BlobStore for CacheDb {
    async fn exists(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let found: bool = conn
                    .query_row("SELECT EXISTS(SELECT 1 FROM blobs WHERE key = ?1)", params![key], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                Ok(found)
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<u8>, Error> {
                let result =
                    conn.query_row("SELECT value FROM blobs WHERE key = ?1", params![&key], |row| row.get(0));

                match result {
                    Ok(value) => Ok(value),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::NotFound(key)),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert-once: a put on an existing key keeps the original bytes.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_vec();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let inserted = conn.execute(
                    "INSERT INTO blobs (key, value, stored_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO NOTHING",
                    params![&key, value, stored_at],
                )?;
                if inserted == 0 {
                    tracing::debug!(%key, "entry already present, keeping original");
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM blobs WHERE substr(key, 1, length(?1)) = ?1")?;
                let keys = stmt
                    .query_map(params![prefix], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let deleted = conn.execute("DELETE FROM blobs WHERE key = ?1", params![&key])?;
                if deleted == 0 {
                    return Err(Error::NotFound(key));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
