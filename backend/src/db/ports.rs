//! Boundaries the connection manager talks through.
//!
//! Postgres implementations live next to this module; `memory` provides
//! in-process versions for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::error::{NotifyError, StoreError};
use crate::models::{
    Connection, ConnectionFilter, ConnectionId, ConnectionStatus, FeedEvent, NewConnection,
    Notification, Profile, UserId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn find(&self, filter: ConnectionFilter) -> Result<Vec<Connection>, StoreError>;

    /// Fails with `StoreError::Conflict` when a live connection already exists for the pair,
    /// and `StoreError::MissingReference` when either user does not exist.
    async fn insert(&self, new: NewConnection) -> Result<Connection, StoreError>;

    /// Moves `id` from `from` to `to`. Returns `None` when the row is gone or no longer in `from`.
    async fn update_status(
        &self,
        id: ConnectionId,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> Result<Option<Connection>, StoreError>;

    /// Deletes `id` only while it is still in `expected`. Visibility may lag.
    async fn delete(&self, id: ConnectionId, expected: ConnectionStatus) -> Result<(), StoreError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<FeedEvent>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn profiles(&self, ids: &[UserId]) -> Result<HashMap<UserId, Profile>, StoreError>;
}
