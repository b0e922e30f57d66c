use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;

use crate::error::Result;

/// Operational tables that back the Dispatcher's hot path: idempotency,
/// rate limiting, and the audit event log.
///
/// Wraps a single `rusqlite::Connection` in a `Mutex` — sufficient for the
/// single-process target this engine is scoped to.
pub struct InfraDb {
    conn: Mutex<Connection>,
}

impl InfraDb {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Insert a pending idempotency record if the key is absent or
    /// expired; returns `true` if this call won the insert (caller should
    /// proceed), `false` if an unexpired record with the same hash already
    /// exists (caller should treat this as a duplicate).
    #[instrument(skip(self, request_hash), fields(key))]
    pub fn try_claim_idempotency(&self, key: &str, request_hash: &str, now_ms: i64, ttl_ms: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<(String, i64)> = conn
            .query_row(
                "SELECT hash, expires_at FROM idempotency WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((hash, expires_at)) = existing {
            if expires_at > now_ms && hash == request_hash {
                return Ok(false);
            }
        }

        let expires_at = now_ms + ttl_ms;
        conn.execute(
            "INSERT INTO idempotency (key, hash, body_blob, expires_at)
             VALUES (?1, ?2, NULL, ?3)
             ON CONFLICT(key) DO UPDATE SET hash = excluded.hash, expires_at = excluded.expires_at",
            params![key, request_hash, expires_at],
        )?;
        Ok(true)
    }

    /// Increment the sliding-window rate counter for `bucket`, resetting
    /// the window if it has expired. Returns the count after this
    /// increment.
    #[instrument(skip(self), fields(bucket))]
    pub fn bump_rate(&self, bucket: &str, now_ms: i64, window_ms: i64) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<(i64, i64)> = conn
            .query_row(
                "SELECT window_start, count FROM rate WHERE bucket = ?1",
                params![bucket],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (window_start, count) = match existing {
            Some((start, count)) if now_ms - start < window_ms => (start, count + 1),
            _ => (now_ms, 1),
        };

        conn.execute(
            "INSERT INTO rate (bucket, window_start, count) VALUES (?1, ?2, ?3)
             ON CONFLICT(bucket) DO UPDATE SET window_start = excluded.window_start, count = excluded.count",
            params![bucket, window_start, count],
        )?;
        Ok(count as u32)
    }

    /// Read the current sliding-window count for `bucket` without
    /// incrementing it — used by `/status` to report rate-limit counters.
    /// Returns `0` if the bucket has no record yet or its window expired.
    #[instrument(skip(self), fields(bucket))]
    pub fn peek_rate(&self, bucket: &str, now_ms: i64, window_ms: i64) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<(i64, i64)> = conn
            .query_row(
                "SELECT window_start, count FROM rate WHERE bucket = ?1",
                params![bucket],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(match existing {
            Some((start, count)) if now_ms - start < window_ms => count as u32,
            _ => 0,
        })
    }

    /// Record an operational event (e.g. `message.processed`).
    #[instrument(skip(self, message, metadata), fields(event_type, status))]
    #[allow(clippy::too_many_arguments)]
    pub fn record_event(
        &self,
        event_type: &str,
        status: &str,
        source: &str,
        message: &str,
        metadata: &str,
        now_ms: i64,
        expires_at: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events (type, time, status, source, message, metadata, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![event_type, now_ms, status, source, message, metadata, expires_at],
        )?;
        Ok(())
    }

    /// Drop all rows whose `expires_at` has passed. Intended to be called
    /// periodically (e.g. alongside the cron ticker) to keep the tables
    /// small; not on the hot path.
    pub fn sweep_expired(&self, now_ms: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM idempotency WHERE expires_at <= ?1", params![now_ms])?;
        conn.execute("DELETE FROM events WHERE expires_at <= ?1", params![now_ms])?;
        Ok(())
    }
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS idempotency (
            key         TEXT PRIMARY KEY,
            hash        TEXT NOT NULL,
            body_blob   BLOB,
            expires_at  INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS rate (
            bucket        TEXT PRIMARY KEY,
            window_start  INTEGER NOT NULL,
            count         INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS events (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            type        TEXT NOT NULL,
            time        INTEGER NOT NULL,
            status      TEXT NOT NULL,
            source      TEXT NOT NULL,
            message     TEXT NOT NULL,
            metadata    TEXT NOT NULL,
            expires_at  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_time ON events(time DESC);",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_claim_is_exclusive_within_ttl() {
        let db = InfraDb::open_in_memory().unwrap();
        assert!(db.try_claim_idempotency("msg:discord:m1", "h1", 0, 1000).unwrap());
        assert!(!db.try_claim_idempotency("msg:discord:m1", "h1", 100, 1000).unwrap());
    }

    #[test]
    fn idempotency_claim_succeeds_after_ttl_expires() {
        let db = InfraDb::open_in_memory().unwrap();
        assert!(db.try_claim_idempotency("msg:discord:m1", "h1", 0, 1000).unwrap());
        assert!(db.try_claim_idempotency("msg:discord:m1", "h1", 2000, 1000).unwrap());
    }

    #[test]
    fn rate_counter_increments_within_window() {
        let db = InfraDb::open_in_memory().unwrap();
        assert_eq!(db.bump_rate("user:discord:u1", 0, 1000).unwrap(), 1);
        assert_eq!(db.bump_rate("user:discord:u1", 100, 1000).unwrap(), 2);
        assert_eq!(db.bump_rate("user:discord:u1", 200, 1000).unwrap(), 3);
    }

    #[test]
    fn rate_counter_resets_on_new_window() {
        let db = InfraDb::open_in_memory().unwrap();
        assert_eq!(db.bump_rate("user:discord:u1", 0, 1000).unwrap(), 1);
        assert_eq!(db.bump_rate("user:discord:u1", 1500, 1000).unwrap(), 1);
    }

    #[test]
    fn peek_rate_does_not_increment_and_expires_with_window() {
        let db = InfraDb::open_in_memory().unwrap();
        assert_eq!(db.peek_rate("user:discord:u1", 0, 1000).unwrap(), 0);
        db.bump_rate("user:discord:u1", 0, 1000).unwrap();
        db.bump_rate("user:discord:u1", 100, 1000).unwrap();
        assert_eq!(db.peek_rate("user:discord:u1", 200, 1000).unwrap(), 2);
        assert_eq!(db.peek_rate("user:discord:u1", 200, 1000).unwrap(), 2);
        assert_eq!(db.peek_rate("user:discord:u1", 1500, 1000).unwrap(), 0);
    }

    #[test]
    fn record_event_does_not_error() {
        let db = InfraDb::open_in_memory().unwrap();
        db.record_event("message.processed", "ok", "dispatcher", "processed", "{}", 0, 1000)
            .unwrap();
    }
}
