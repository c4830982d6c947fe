//! In-memory stores.
//!
//! Suitable for tests and single-process development. Records are kept serialized, the
//! way Redis keeps them, so decoding and corruption behave like the real store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use banter_common::{
    clock::Clock,
    error::StoreError,
    models::{
        account::AccountCredentials,
        session::{Session, SessionFilter},
    },
};
use uuid::Uuid;

use crate::repository::accounts::AccountLookup;
use crate::repository::sessions::{
    decode_session, encode_session, is_session_key, session_key, ScanWindow, SessionStore,
    SessionTtl,
};

/// In-memory [`SessionStore`].
///
/// Keys iterate in sorted order, so consecutive pages over an unchanged store are
/// stable. Records past `expires_at` read as absent, the same as a Redis key whose
/// TTL ran out between `SCAN` and `MGET`: they still occupy their slot in the page
/// window, so a page can come back short.
#[derive(Clone)]
pub struct InMemorySessionStore {
    records: Arc<RwLock<BTreeMap<String, String>>>,
    clock: Arc<dyn Clock>,
    ttl: SessionTtl,
}

impl InMemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: SessionTtl) -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            clock,
            ttl,
        }
    }

    /// Write a raw value under a key, bypassing encoding.
    pub fn insert_raw(&self, key: impl Into<String>, raw: impl Into<String>) {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), raw.into());
    }

    fn live(&self, key: &str, raw: &str) -> Result<Option<Session>, StoreError> {
        let session = decode_session(key, raw)?;
        if session.is_expired(self.clock.now()) {
            return Ok(None);
        }
        Ok(Some(session))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
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
        let raw = encode_session(&session)?;
        self.insert_raw(session_key(session_id), raw);
        Ok(session)
    }

    async fn fetch_one(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let key = session_key(session_id);
        let raw = self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned();
        match raw {
            Some(raw) => self.live(&key, &raw),
            None => Ok(None),
        }
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

        let records = self.records.read().unwrap_or_else(|e| e.into_inner()).clone();
        for key in records.keys().filter(|key| is_session_key(key)) {
            if window.is_full() {
                break;
            }
            window.offer(key.clone());
        }

        let mut sessions = Vec::new();
        for key in window.into_keys() {
            let Some(raw) = records.get(&key) else { continue };
            if let Some(session) = self.live(&key, raw)? {
                if filter.matches(&session) {
                    sessions.push(session);
                }
            }
        }
        Ok(sessions)
    }

    async fn delete(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let key = session_key(session_id);
        let raw = self
            .records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
        match raw {
            Some(raw) => self.live(&key, &raw),
            None => Ok(None),
        }
    }
}

/// In-memory [`AccountLookup`], keyed by lower-cased username.
#[derive(Clone, Default)]
pub struct InMemoryAccounts {
    accounts: Arc<RwLock<HashMap<String, AccountCredentials>>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, username: &str, credentials: AccountCredentials) {
        self.accounts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(username.to_lowercase(), credentials);
    }
}

#[async_trait]
impl AccountLookup for InMemoryAccounts {
    async fn fetch_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountCredentials>, StoreError> {
        Ok(self
            .accounts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&username.to_lowercase())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_common::clock::ManualClock;
    use chrono::{Duration, Utc};
    use std::collections::HashSet;

    fn store() -> (InMemorySessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = InMemorySessionStore::new(
            clock.clone(),
            SessionTtl::new(std::time::Duration::from_secs(3600)),
        );
        (store, clock)
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let (store, _) = store();
        let account = Uuid::now_v7();
        let created = store.create(Uuid::new_v4(), account, "curl/8.0").await.unwrap();

        assert!(created.expires_at > created.created_at);
        let fetched = store.fetch_one(created.session_id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_delete_returns_prior_record_once() {
        let (store, _) = store();
        let created = store
            .create(Uuid::new_v4(), Uuid::now_v7(), "curl/8.0")
            .await
            .unwrap();

        let deleted = store.delete(created.session_id).await.unwrap();
        assert_eq!(deleted, Some(created.clone()));
        assert_eq!(store.delete(created.session_id).await.unwrap(), None);
        assert_eq!(store.fetch_one(created.session_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_sessions_read_as_absent() {
        let (store, clock) = store();
        let created = store
            .create(Uuid::new_v4(), Uuid::now_v7(), "curl/8.0")
            .await
            .unwrap();

        clock.advance(Duration::seconds(3600));
        assert_eq!(store.fetch_one(created.session_id).await.unwrap(), None);
        assert!(
            store
                .fetch_many(&SessionFilter::default(), 1, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_two_pages_cover_fifteen_sessions_exactly_once() {
        let (store, _) = store();
        for _ in 0..15 {
            store
                .create(Uuid::new_v4(), Uuid::now_v7(), "curl/8.0")
                .await
                .unwrap();
        }

        let first = store.fetch_many(&SessionFilter::default(), 1, 10).await.unwrap();
        let second = store.fetch_many(&SessionFilter::default(), 2, 10).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 5);

        let ids: HashSet<Uuid> = first.iter().chain(&second).map(|s| s.session_id).collect();
        assert_eq!(ids.len(), 15);
    }

    #[tokio::test]
    async fn test_expired_records_still_take_their_page_slot() {
        let (store, clock) = store();
        for _ in 0..2 {
            store.create(Uuid::new_v4(), Uuid::now_v7(), "old").await.unwrap();
        }
        clock.advance(Duration::seconds(1800));
        for _ in 0..3 {
            store.create(Uuid::new_v4(), Uuid::now_v7(), "new").await.unwrap();
        }
        clock.advance(Duration::seconds(1800));

        let page = store.fetch_many(&SessionFilter::default(), 1, 5).await.unwrap();
        assert_eq!(page.len(), 3);
        assert!(page.iter().all(|s| s.user_agent == "new"));
    }

    #[tokio::test]
    async fn test_zero_page_size_returns_nothing() {
        let (store, _) = store();
        store
            .create(Uuid::new_v4(), Uuid::now_v7(), "curl/8.0")
            .await
            .unwrap();
        assert!(
            store
                .fetch_many(&SessionFilter::default(), 1, 0)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_filters_apply_after_the_page_is_read() {
        let (store, _) = store();
        let wanted = Uuid::now_v7();
        for i in 0..6 {
            let account = if i % 2 == 0 { wanted } else { Uuid::now_v7() };
            store.create(Uuid::new_v4(), account, "curl/8.0").await.unwrap();
        }

        let filter = SessionFilter {
            account_id: Some(wanted),
            user_agent: None,
        };
        let all = store.fetch_many(&filter, 1, 6).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|s| s.account_id == wanted));

        // A page narrower than the keyspace only yields the matches inside it
        let narrow = store.fetch_many(&filter, 1, 2).await.unwrap();
        assert!(narrow.len() <= 2);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error_not_a_miss() {
        let (store, _) = store();
        let id = Uuid::new_v4();
        store.insert_raw(session_key(id), "{\"session_id\":");

        let err = store.fetch_one(id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_account_lookup_is_case_insensitive() {
        let accounts = InMemoryAccounts::new();
        let credentials = AccountCredentials {
            id: Uuid::now_v7(),
            password_hash: "hash".into(),
        };
        accounts.insert("CmyUi", credentials.clone());

        assert_eq!(
            accounts.fetch_by_username("cmyui").await.unwrap(),
            Some(credentials)
        );
        assert_eq!(accounts.fetch_by_username("nobody").await.unwrap(), None);
    }
}
