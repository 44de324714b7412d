//! Advisory TTL lock (spec.md §5): mutual exclusion for whole-pipeline
//! runs across processes, backed by a single-row table in the store.
//! Not enforced by the store itself beyond row-level atomicity — a
//! misbehaving caller can still write around it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::error::PipelineError;

const LOCK_NAME: &str = "pipeline_run";

#[derive(Debug, Clone)]
pub struct RunLock {
    conn: Arc<Mutex<Connection>>,
    owner_id: String,
    ttl: Duration,
}

impl RunLock {
    pub fn new(conn: Arc<Mutex<Connection>>, owner_id: String, ttl_seconds: i64) -> Self {
        Self {
            conn,
            owner_id,
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Atomic insert-or-takeover-if-expired. Succeeds if no row exists,
    /// or if the existing row's `expires_at` is in the past.
    pub fn acquire(&self) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let affected = conn
            .execute(
                "INSERT INTO run_lock (name, owner_id, acquired_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                     owner_id = excluded.owner_id,
                     acquired_at = excluded.acquired_at,
                     expires_at = excluded.expires_at
                 WHERE run_lock.expires_at < ?5",
                params![LOCK_NAME, self.owner_id, fmt(now), fmt(expires_at), fmt(now)],
            )
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        if affected == 1 {
            info!(owner_id = %self.owner_id, "acquired run lock");
            return Ok(());
        }

        // The row existed and wasn't expired: report who holds it.
        let holder: Option<(String, String)> = conn
            .query_row(
                "SELECT owner_id, expires_at FROM run_lock WHERE name = ?1",
                params![LOCK_NAME],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        match holder {
            Some((owner, expires)) => Err(PipelineError::StoreConflict(format!(
                "run lock held by '{owner}' until {expires}"
            ))),
            None => Err(PipelineError::Store("run lock row vanished during acquire".into())),
        }
    }

    /// Extend the lock's expiry. A no-op if this process no longer
    /// owns the row (e.g. it expired and was taken over already); the
    /// caller is expected to treat that as a signal to abort the run.
    pub fn refresh(&self) -> Result<bool, PipelineError> {
        let conn = self.conn.lock();
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let affected = conn
            .execute(
                "UPDATE run_lock SET expires_at = ?1 WHERE name = ?2 AND owner_id = ?3",
                params![fmt(expires_at), LOCK_NAME, self.owner_id],
            )
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        if affected == 0 {
            warn!(owner_id = %self.owner_id, "lost run lock ownership on refresh");
        }
        Ok(affected == 1)
    }

    /// Delete the row iff this process owns it. Idempotent: calling
    /// release twice, or after losing ownership, is not an error.
    pub fn release(&self) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM run_lock WHERE name = ?1 AND owner_id = ?2",
            params![LOCK_NAME, self.owner_id],
        )
        .map_err(|e| PipelineError::Store(e.to_string()))?;
        Ok(())
    }
}

fn fmt(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema;

    fn conn_handle() -> Arc<Mutex<Connection>> {
        let mut conn = Connection::open_in_memory().unwrap();
        schema::migrate(&mut conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn acquire_then_conflict_for_second_owner() {
        let handle = conn_handle();
        let a = RunLock::new(handle.clone(), "owner-a".into(), 60);
        let b = RunLock::new(handle, "owner-b".into(), 60);
        a.acquire().unwrap();
        let err = b.acquire().unwrap_err();
        assert!(matches!(err, PipelineError::StoreConflict(_)));
    }

    #[test]
    fn release_then_reacquire_by_other_owner() {
        let handle = conn_handle();
        let a = RunLock::new(handle.clone(), "owner-a".into(), 60);
        let b = RunLock::new(handle, "owner-b".into(), 60);
        a.acquire().unwrap();
        a.release().unwrap();
        b.acquire().unwrap();
    }

    #[test]
    fn takeover_after_expiry() {
        let handle = conn_handle();
        let a = RunLock::new(handle.clone(), "owner-a".into(), -1);
        a.acquire().unwrap();
        let b = RunLock::new(handle, "owner-b".into(), 60);
        b.acquire().unwrap();
    }

    #[test]
    fn refresh_fails_after_losing_ownership() {
        let handle = conn_handle();
        let a = RunLock::new(handle.clone(), "owner-a".into(), -1);
        a.acquire().unwrap();
        let b = RunLock::new(handle, "owner-b".into(), 60);
        b.acquire().unwrap();
        assert!(!a.refresh().unwrap());
    }

    #[test]
    fn release_is_idempotent() {
        let handle = conn_handle();
        let a = RunLock::new(handle, "owner-a".into(), 60);
        a.acquire().unwrap();
        a.release().unwrap();
        a.release().unwrap();
    }
}
