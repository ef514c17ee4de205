use moka::future::Cache;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::constants::{SESSION_CACHE_IDLE_SECS, SESSION_CACHE_MAX_USERS};
use crate::models::{ConnectionChange, ConnectionList, FeedEvent, UserId};

/// Marks the invalidation count a list was computed against. A list is only
/// stored if no invalidation happened in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheToken(u64);

/// Per-user cache of connection lists for active sessions.
///
/// Bounded by user count and idle time. Every invalidation bumps a single
/// counter, so a list computed while anything changed is not stored.
pub struct SessionCache {
    lists: Cache<UserId, ConnectionList>,
    invalidations: AtomicU64,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("entries", &self.lists.entry_count())
            .field("invalidations", &self.invalidations.load(Ordering::SeqCst))
            .finish()
    }
}

impl SessionCache {
    pub fn new() -> Self {
        Self::with_limits(SESSION_CACHE_MAX_USERS, Duration::from_secs(SESSION_CACHE_IDLE_SECS))
    }

    pub fn with_limits(max_users: u64, idle: Duration) -> Self {
        Self {
            lists: Cache::builder()
                .max_capacity(max_users)
                .time_to_idle(idle)
                .build(),
            invalidations: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, user_id: UserId) -> Option<ConnectionList> {
        self.lists.get(&user_id).await
    }

    /// Take before reading from the store; hand back to `put`.
    pub fn token(&self) -> CacheToken {
        CacheToken(self.invalidations.load(Ordering::SeqCst))
    }

    /// Returns false when anything was invalidated after `token` was taken.
    pub async fn put(&self, user_id: UserId, token: CacheToken, list: ConnectionList) -> bool {
        if self.token() != token {
            return false;
        }
        self.lists.insert(user_id, list).await;

        // An invalidation that raced the insert may have removed the key before it landed.
        if self.token() != token {
            self.lists.invalidate(&user_id).await;
            return false;
        }
        true
    }

    pub async fn invalidate(&self, user_id: UserId) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.lists.invalidate(&user_id).await;
    }

    pub async fn invalidate_change(&self, change: &ConnectionChange) {
        self.invalidate(change.requester_id).await;
        self.invalidate(change.recipient_id).await;
    }

    pub fn clear(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.lists.invalidate_all();
    }

    /// Number of cached lists once pending evictions have run.
    pub async fn len(&self) -> u64 {
        self.lists.run_pending_tasks().await;
        self.lists.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop cached lists as changes arrive on the feed. Everything goes when the
    /// feed resets or this receiver falls behind.
    pub fn watch(self: Arc<Self>, mut events: broadcast::Receiver<FeedEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(FeedEvent::Changed(change)) => {
                        tracing::debug!("Connection {} changed ({:?}), invalidating", change.id, change.op);
                        self.invalidate_change(&change).await;
                    }
                    Ok(FeedEvent::Reset) => {
                        tracing::info!("Change feed resubscribed, clearing session cache");
                        self.clear();
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("Change feed lagged by {} events, clearing session cache", missed);
                        self.clear();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Change feed closed, session cache watcher exiting");
                        break;
                    }
                }
            }
        })
    }
}
