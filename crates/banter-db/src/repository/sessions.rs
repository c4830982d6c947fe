//! Session repository: session records in Redis.
//!
//! Each session lives under `server:sessions:{session_id}` as a JSON document with a
//! Redis-side TTL, so expiry is enforced by the store and nothing here polls for it.
//!
//! Listing walks the keyspace with `SCAN`. Redis gives no ordering guarantee for a
//! scan, so neither does [`SessionStore::fetch_many`]; pages are disjoint only while
//! the keyspace is not being reshaped under them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use banter_common::{
    clock::Clock,
    error::StoreError,
    models::session::{Session, SessionFilter},
};
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::redis_pool;

const SESSION_KEY_PREFIX: &str = "server:sessions:";
const SESSION_SCAN_PATTERN: &str = "server:sessions:*";

/// Durable session records. The only writer of session data.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session expiring one TTL from now.
    async fn create(
        &self,
        session_id: Uuid,
        account_id: Uuid,
        user_agent: &str,
    ) -> Result<Session, StoreError>;

    /// Point read. `Ok(None)` means the record does not exist (or has expired).
    async fn fetch_one(&self, session_id: Uuid) -> Result<Option<Session>, StoreError>;

    /// One page of sessions, `page` 1-based, filters applied after the page is read.
    async fn fetch_many(
        &self,
        filter: &SessionFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Session>, StoreError>;

    /// Remove a session, returning the record as it was just before deletion.
    async fn delete(&self, session_id: Uuid) -> Result<Option<Session>, StoreError>;
}

/// Session lifetime, clamped to `[1s, i32::MAX s]` so it is always a valid Redis `EX`
/// and always puts `expires_at` strictly after `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTtl {
    secs: u64,
}

impl SessionTtl {
    pub fn new(ttl: Duration) -> Self {
        Self {
            secs: ttl.as_secs().clamp(1, i32::MAX as u64),
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.secs
    }

    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.secs as i64)
    }
}

/// Redis key for a session id.
pub fn session_key(session_id: Uuid) -> String {
    format!("{SESSION_KEY_PREFIX}{session_id}")
}

/// Whether a key belongs to the session keyspace.
pub fn is_session_key(key: &str) -> bool {
    key.starts_with(SESSION_KEY_PREFIX)
}

pub fn encode_session(session: &Session) -> Result<String, StoreError> {
    serde_json::to_string(session).map_err(StoreError::Serialize)
}

/// Decode a stored record. Anything that does not parse completely is corrupt.
pub fn decode_session(key: &str, raw: &str) -> Result<Session, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        key: key.to_owned(),
        source,
    })
}

/// Selects the keys belonging to one page while a cursor walks the keyspace.
///
/// The first `(page - 1) * page_size` distinct keys are skipped, the next `page_size`
/// distinct keys are kept. Keys a cursor hands out twice count once.
#[derive(Debug)]
pub struct ScanWindow {
    skip: usize,
    take: usize,
    seen: HashSet<String>,
    keys: Vec<String>,
}

impl ScanWindow {
    /// `page` 0 is treated as page 1. A `page_size` of 0 yields a window that is
    /// already full, i.e. an empty page.
    pub fn new(page: u32, page_size: u32) -> Self {
        let take = page_size as usize;
        let skip = (page.max(1) as usize - 1).saturating_mul(take);
        Self {
            skip,
            take,
            seen: HashSet::new(),
            keys: Vec::with_capacity(take.min(1024)),
        }
    }

    pub fn offer(&mut self, key: String) {
        if self.is_full() || self.seen.contains(&key) {
            return;
        }
        self.seen.insert(key.clone());
        if self.seen.len() > self.skip {
            self.keys.push(key);
        }
    }

    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.take
    }

    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }
}

/// [`SessionStore`] backed by Redis.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    clock: Arc<dyn Clock>,
    ttl: SessionTtl,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, clock: Arc<dyn Clock>, ttl: SessionTtl) -> Self {
        Self { conn, clock, ttl }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(
        &self,
        session_id: Uuid,
        account_id: Uuid,
        user_agent: &str,
    ) -> Result<Session, StoreError> {
        let now = self.clock.now();
        let session = Session {
            session_id,
            account_id,
            user_agent: user_agent.to_owned(),
            created_at: now,
            updated_at: now,
            expires_at: now + self.ttl.as_chrono(),
        };

        let mut conn = self.conn.clone();
        redis_pool::set_ex(
            &mut conn,
            &session_key(session_id),
            &encode_session(&session)?,
            self.ttl.as_secs(),
        )
        .await?;

        Ok(session)
    }

    async fn fetch_one(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let key = session_key(session_id);
        let mut conn = self.conn.clone();
        redis_pool::get(&mut conn, &key)
            .await?
            .map(|raw| decode_session(&key, &raw))
            .transpose()
    }

    async fn fetch_many(
        &self,
        filter: &SessionFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Session>, StoreError> {
        let mut window = ScanWindow::new(page, page_size);
        if window.is_full() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let mut cursor = 0;
        loop {
            let (next, keys) =
                redis_pool::scan_match(&mut conn, cursor, SESSION_SCAN_PATTERN, page_size as usize)
                    .await?;
            for key in keys {
                window.offer(key);
            }
            cursor = next;
            // Cursor back at 0 means the walk is complete
            if cursor == 0 || window.is_full() {
                break;
            }
        }

        let keys = window.into_keys();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let raw_sessions = redis_pool::mget(&mut conn, &keys).await?;
        let mut sessions = Vec::with_capacity(keys.len());
        for (key, raw) in keys.iter().zip(raw_sessions) {
            // Expired between SCAN and MGET
            let Some(raw) = raw else { continue };
            let session = decode_session(key, &raw)?;
            if filter.matches(&session) {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    async fn delete(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let key = session_key(session_id);
        let mut conn = self.conn.clone();
        redis_pool::get_del(&mut conn, &key)
            .await?
            .map(|raw| decode_session(&key, &raw))
            .transpose()
    }
}
