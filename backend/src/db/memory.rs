//! In-process implementations of the persistence ports.
//!
//! Used by the test suites and handy for running the API without Postgres.
//! The connection store mirrors the database constraints: one live row per
//! unordered pair, conditional updates and conditional deletes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use super::ports::{ChangeFeed, ConnectionStore, NotificationSink, ProfileDirectory};
use crate::constants::CHANGE_FEED_CAPACITY;
use crate::error::{NotifyError, StoreError};
use crate::models::{
    ChangeOp, Connection, ConnectionChange, ConnectionFilter, ConnectionId, ConnectionStatus,
    FeedEvent, NewConnection, Notification, Profile, UserId,
};

#[derive(Debug)]
pub struct InMemoryConnectionStore {
    rows: Mutex<HashMap<ConnectionId, Connection>>,
    lagging_deletes: AtomicU32,
    delete_calls: AtomicU32,
    changes: broadcast::Sender<FeedEvent>,
}

impl Default for InMemoryConnectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnectionStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            rows: Mutex::new(HashMap::new()),
            lagging_deletes: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
            changes,
        }
    }

    /// Make the next `count` deletes report success while leaving the row in place.
    pub fn lag_next_deletes(&self, count: u32) {
        self.lagging_deletes.store(count, Ordering::SeqCst);
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Insert a row as-is, bypassing the uniqueness check. Used for legacy `declined` rows.
    pub async fn seed(&self, connection: Connection) {
        self.rows.lock().await.insert(connection.id, connection);
    }

    pub async fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.rows.lock().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Tell subscribers that changes may have been missed, as after a dropped LISTEN connection.
    pub fn reset_feed(&self) {
        let _ = self.changes.send(FeedEvent::Reset);
    }

    fn publish(&self, op: ChangeOp, connection: &Connection) {
        let _ = self.changes.send(FeedEvent::Changed(ConnectionChange::of(op, connection)));
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn find(&self, filter: ConnectionFilter) -> Result<Vec<Connection>, StoreError> {
        let rows = self.rows.lock().await;
        let mut found: Vec<Connection> = rows
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn insert(&self, new: NewConnection) -> Result<Connection, StoreError> {
        let mut rows = self.rows.lock().await;
        let taken = rows
            .values()
            .any(|c| c.status.is_live() && c.connects(new.requester_id, new.recipient_id));
        if taken {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let connection = Connection {
            id: Uuid::new_v4(),
            requester_id: new.requester_id,
            recipient_id: new.recipient_id,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        rows.insert(connection.id, connection.clone());
        drop(rows);

        self.publish(ChangeOp::Insert, &connection);
        Ok(connection)
    }

    async fn update_status(
        &self,
        id: ConnectionId,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> Result<Option<Connection>, StoreError> {
        let mut rows = self.rows.lock().await;
        let updated = match rows.get_mut(&id) {
            Some(connection) if connection.status == from => {
                connection.status = to;
                connection.updated_at = Utc::now();
                connection.clone()
            }
            _ => return Ok(None),
        };
        drop(rows);

        self.publish(ChangeOp::Update, &updated);
        Ok(Some(updated))
    }

    async fn delete(&self, id: ConnectionId, expected: ConnectionStatus) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let lagged = self
            .lagging_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lagged {
            return Ok(());
        }

        let mut rows = self.rows.lock().await;
        let removed = match rows.get(&id) {
            Some(connection) if connection.status == expected => rows.remove(&id),
            _ => None,
        };
        drop(rows);

        if let Some(connection) = removed {
            self.publish(ChangeOp::Delete, &connection);
        }
        Ok(())
    }
}

impl ChangeFeed for InMemoryConnectionStore {
    fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.changes.subscribe()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProfileDirectory {
    profiles: Mutex<HashMap<UserId, Profile>>,
}

impl InMemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: Profile) {
        self.profiles.lock().await.insert(profile.id, profile);
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryProfileDirectory {
    async fn profiles(&self, ids: &[UserId]) -> Result<HashMap<UserId, Profile>, StoreError> {
        let profiles = self.profiles.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| profiles.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

/// Keeps every notification it is handed. Can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Unavailable("sink offline".to_string()));
        }
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}
