//! Live connection registry.
//!
//! Maps account id → the set of connections currently authenticated for it. One account
//! may be connected from several devices at once, and all of them receive its messages.
//! Only the gateway's connection loops mutate it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::CloseFrame;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::connection::Outbound;
use crate::frames::ServerFrame;

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A writable reference to one live connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    /// Session the connection authenticated with
    pub session_id: Uuid,
    outbound: mpsc::Sender<Outbound>,
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("recipient queue stayed full past the send timeout")]
    Timeout,

    #[error("recipient connection is gone")]
    Closed,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, session_id: Uuid, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            session_id,
            outbound,
        }
    }

    /// Queue a frame for this connection, waiting at most `timeout` for room.
    pub async fn deliver(&self, frame: ServerFrame, timeout: Duration) -> Result<(), DeliveryError> {
        self.outbound
            .send_timeout(Outbound::Frame(frame), timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => DeliveryError::Timeout,
                mpsc::error::SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Tell the connection's writer to send `frame` and stop.
    pub async fn close(&self, frame: Option<CloseFrame>, timeout: Duration) -> Result<(), DeliveryError> {
        self.outbound
            .send_timeout(Outbound::Close(frame), timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => DeliveryError::Timeout,
                mpsc::error::SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }
}

#[derive(Default)]
struct Inner {
    by_account: HashMap<Uuid, HashMap<ConnectionId, ConnectionHandle>>,
    /// Reverse index; a connection lives under at most one account
    owner: HashMap<ConnectionId, Uuid>,
}

impl Inner {
    fn remove(&mut self, account_id: Uuid, id: ConnectionId) -> bool {
        let Some(handles) = self.by_account.get_mut(&account_id) else {
            return false;
        };
        let removed = handles.remove(&id).is_some();
        if handles.is_empty() {
            self.by_account.remove(&account_id);
        }
        if removed {
            self.owner.remove(&id);
        }
        removed
    }
}

/// Tracks every authenticated connection in this process.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh connection id.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Add `handle` under `account_id`. Registering the same handle again is a no-op;
    /// registering it under a different account moves it.
    pub async fn register(&self, account_id: Uuid, handle: ConnectionHandle) {
        let mut inner = self.inner.write().await;
        if let Some(previous) = inner.owner.get(&handle.id).copied() {
            if previous != account_id {
                inner.remove(previous, handle.id);
            }
        }
        inner.owner.insert(handle.id, account_id);
        inner
            .by_account
            .entry(account_id)
            .or_default()
            .insert(handle.id, handle);
    }

    /// Remove a connection. Absent connections are ignored.
    pub async fn unregister(&self, account_id: Uuid, id: ConnectionId) -> bool {
        self.inner.write().await.remove(account_id, id)
    }

    /// Snapshot of the connections for `account_id`; empty when the account is offline.
    ///
    /// The lock is released before this returns, so writes to the handles never hold it.
    pub async fn list_recipients(&self, account_id: Uuid) -> Vec<ConnectionHandle> {
        self.inner
            .read()
            .await
            .by_account
            .get(&account_id)
            .map(|handles| handles.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove every connection bound to `session_id` except `keep`, returning them.
    pub async fn unregister_session(
        &self,
        session_id: Uuid,
        keep: ConnectionId,
    ) -> Vec<ConnectionHandle> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<(Uuid, ConnectionHandle)> = inner
            .by_account
            .iter()
            .flat_map(|(account_id, handles)| {
                handles
                    .values()
                    .filter(|h| h.session_id == session_id && h.id != keep)
                    .map(move |h| (*account_id, h.clone()))
            })
            .collect();

        doomed
            .into_iter()
            .map(|(account_id, handle)| {
                inner.remove(account_id, handle.id);
                handle
            })
            .collect()
    }

    pub async fn is_online(&self, account_id: Uuid) -> bool {
        self.inner.read().await.by_account.contains_key(&account_id)
    }

    /// Total live connections across all accounts.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.owner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(registry: &ConnectionRegistry) -> (ConnectionHandle, mpsc::Receiver<Outbound>) {
        handle_for(registry, Uuid::new_v4())
    }

    fn handle_for(
        registry: &ConnectionRegistry,
        session_id: Uuid,
    ) -> (ConnectionHandle, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(1);
        (ConnectionHandle::new(registry.next_id(), session_id, tx), rx)
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let account = Uuid::now_v7();
        let (h, _rx) = handle(&registry);

        registry.register(account, h.clone()).await;
        registry.register(account, h.clone()).await;

        assert_eq!(registry.list_recipients(account).await, vec![h]);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_two_devices_on_one_account() {
        let registry = ConnectionRegistry::new();
        let account = Uuid::now_v7();
        let (a, _ra) = handle(&registry);
        let (b, _rb) = handle(&registry);

        registry.register(account, a.clone()).await;
        registry.register(account, b.clone()).await;

        let recipients = registry.list_recipients(account).await;
        assert_eq!(recipients.len(), 2);
        assert!(recipients.contains(&a) && recipients.contains(&b));

        assert!(registry.unregister(account, a.id).await);
        assert_eq!(registry.list_recipients(account).await, vec![b]);
    }

    #[tokio::test]
    async fn test_handle_lives_under_one_account() {
        let registry = ConnectionRegistry::new();
        let (first, second) = (Uuid::now_v7(), Uuid::now_v7());
        let (h, _rx) = handle(&registry);

        registry.register(first, h.clone()).await;
        registry.register(second, h.clone()).await;

        assert!(registry.list_recipients(first).await.is_empty());
        assert!(!registry.is_online(first).await);
        assert_eq!(registry.list_recipients(second).await, vec![h]);
    }

    #[tokio::test]
    async fn test_unregister_absent_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        let account = Uuid::now_v7();
        let (h, _rx) = handle(&registry);

        assert!(!registry.unregister(account, h.id).await);
        registry.register(account, h.clone()).await;
        assert!(registry.unregister(account, h.id).await);
        assert!(!registry.unregister(account, h.id).await);

        assert!(registry.list_recipients(account).await.is_empty());
        assert!(!registry.is_online(account).await);
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_deliver_reports_full_and_closed_queues() {
        let registry = ConnectionRegistry::new();
        let (h, mut rx) = handle(&registry);
        let frame = ServerFrame::Accepted {};
        let timeout = Duration::from_millis(20);

        assert_eq!(h.deliver(frame.clone(), timeout).await, Ok(()));
        // Capacity 1 and nobody draining
        assert_eq!(h.deliver(frame.clone(), timeout).await, Err(DeliveryError::Timeout));

        assert!(matches!(rx.recv().await, Some(Outbound::Frame(ServerFrame::Accepted {}))));
        drop(rx);
        assert_eq!(h.deliver(frame, timeout).await, Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn test_unregister_session_keeps_the_caller() {
        let registry = ConnectionRegistry::new();
        let account = Uuid::now_v7();
        let session = Uuid::new_v4();
        let (own, _r1) = handle_for(&registry, session);
        let (twin, _r2) = handle_for(&registry, session);
        let (other, _r3) = handle(&registry);

        for h in [&own, &twin, &other] {
            registry.register(account, h.clone()).await;
        }

        let dropped = registry.unregister_session(session, own.id).await;
        assert_eq!(dropped, vec![twin]);

        let left = registry.list_recipients(account).await;
        assert_eq!(left.len(), 2);
        assert!(left.contains(&own) && left.contains(&other));
        assert!(registry.unregister_session(session, own.id).await.is_empty());
    }
}
