//! Connection lifecycle: request, accept, decline, cancel, remove and list.
//!
//! Every operation validates against the store before mutating. Races between
//! two actors are settled by the store's conditional writes; the loser gets
//! `InvalidState` or `DuplicateRequest`. Notifications are best effort.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::notices::Notices;
use super::session_cache::SessionCache;
use crate::constants::{DELETE_VERIFY_BACKOFF_MS, DELETE_VERIFY_MAX_ATTEMPTS, UNKNOWN_USER_NAME};
use crate::db::{ConnectionStore, NotificationSink, ProfileDirectory};
use crate::error::{ConnectionError, DuplicateKind, StoreError};
use crate::models::{
    Connection, ConnectionActionInput, ConnectionEntry, ConnectionFilter, ConnectionId,
    ConnectionList, ConnectionStatus, NewConnection, Notification, Profile, SendRequestInput,
    UserId,
};
use crate::utils::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total delete attempts, including the first.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DELETE_VERIFY_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DELETE_VERIFY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.delete_verify_attempts.max(1),
            backoff: config.delete_verify_backoff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    StillPresent,
}

/// Which party may perform a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Requester,
    Recipient,
    Either,
}

impl Party {
    fn permits(self, connection: &Connection, user_id: UserId) -> bool {
        match self {
            Party::Requester => connection.requester_id == user_id,
            Party::Recipient => connection.recipient_id == user_id,
            Party::Either => connection.involves(user_id),
        }
    }
}

pub struct ConnectionManager {
    store: Arc<dyn ConnectionStore>,
    notifier: Arc<dyn NotificationSink>,
    profiles: Arc<dyn ProfileDirectory>,
    cache: Arc<SessionCache>,
    notices: Notices,
    retry: RetryPolicy,
}

impl ConnectionManager {
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        notifier: Arc<dyn NotificationSink>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        Self {
            store,
            notifier,
            profiles,
            cache: Arc::new(SessionCache::new()),
            notices: Notices::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_notices(mut self, notices: Notices) -> Self {
        self.notices = notices;
        self
    }

    pub fn cache(&self) -> Arc<SessionCache> {
        self.cache.clone()
    }

    pub async fn send_request(&self, input: SendRequestInput) -> Result<Connection, ConnectionError> {
        let SendRequestInput { requester_id, recipient_id } = input;
        if requester_id == recipient_id {
            return Err(ConnectionError::InvalidRequest(
                "cannot send a connection request to yourself".to_string(),
            ));
        }

        if let Some(live) = self.live_between(requester_id, recipient_id).await? {
            return Err(ConnectionError::DuplicateRequest(duplicate_kind(live.status)));
        }

        let connection = match self
            .store
            .insert(NewConnection { requester_id, recipient_id })
            .await
        {
            Ok(connection) => connection,
            Err(StoreError::Conflict) => {
                // A concurrent request for the same pair got in first.
                let kind = self
                    .live_between(requester_id, recipient_id)
                    .await?
                    .map(|live| duplicate_kind(live.status))
                    .unwrap_or(DuplicateKind::AlreadyPending);
                return Err(ConnectionError::DuplicateRequest(kind));
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Connection request {} sent: {} -> {}",
            connection.id, requester_id, recipient_id
        );
        self.invalidate_parties(&connection).await;

        let name = self.display_name(requester_id).await;
        self.notify(self.notices.request_sent(&connection, &name)).await;

        Ok(connection)
    }

    pub async fn accept(&self, input: ConnectionActionInput) -> Result<Connection, ConnectionError> {
        let connection = self
            .authorize(input, Party::Recipient, ConnectionStatus::Pending)
            .await?;

        let accepted = match self
            .store
            .update_status(connection.id, ConnectionStatus::Pending, ConnectionStatus::Accepted)
            .await?
        {
            Some(accepted) => accepted,
            None => return Err(self.lost_race(connection.id, ConnectionStatus::Pending).await),
        };

        info!("Connection {} accepted by {}", accepted.id, input.acting_user_id);
        self.invalidate_parties(&accepted).await;

        let name = self.display_name(accepted.recipient_id).await;
        self.notify(self.notices.request_accepted(&accepted, &name)).await;

        Ok(accepted)
    }

    /// Recipient turns down a pending request. The row is deleted, not marked declined.
    pub async fn decline(&self, input: ConnectionActionInput) -> Result<(), ConnectionError> {
        let connection = self
            .authorize(input, Party::Recipient, ConnectionStatus::Pending)
            .await?;
        self.delete_verified(&connection, ConnectionStatus::Pending).await?;

        info!("Connection request {} declined by {}", connection.id, input.acting_user_id);

        let name = self.display_name(connection.recipient_id).await;
        self.notify(self.notices.request_declined(&connection, &name)).await;
        Ok(())
    }

    /// Requester withdraws a pending request.
    pub async fn cancel(&self, input: ConnectionActionInput) -> Result<(), ConnectionError> {
        let connection = self
            .authorize(input, Party::Requester, ConnectionStatus::Pending)
            .await?;
        self.delete_verified(&connection, ConnectionStatus::Pending).await?;

        info!("Connection request {} cancelled by {}", connection.id, input.acting_user_id);

        let name = self.display_name(connection.requester_id).await;
        self.notify(self.notices.request_cancelled(&connection, &name)).await;
        Ok(())
    }

    /// Either party ends an accepted connection.
    pub async fn remove(&self, input: ConnectionActionInput) -> Result<(), ConnectionError> {
        let connection = self
            .authorize(input, Party::Either, ConnectionStatus::Accepted)
            .await?;
        self.delete_verified(&connection, ConnectionStatus::Accepted).await?;

        info!("Connection {} removed by {}", connection.id, input.acting_user_id);

        let name = self.display_name(input.acting_user_id).await;
        self.notify(
            self.notices
                .connection_removed(&connection, input.acting_user_id, &name),
        )
        .await;
        Ok(())
    }

    /// Accepted and pending connections for `user_id`, newest first within each group.
    pub async fn list(&self, user_id: UserId) -> Result<ConnectionList, ConnectionError> {
        if let Some(list) = self.cache.get(user_id).await {
            return Ok(list);
        }

        let token = self.cache.token();
        let connections: Vec<Connection> = self
            .store
            .find(ConnectionFilter::Involving(user_id))
            .await?
            .into_iter()
            .filter(|c| c.status.is_live())
            .collect();

        let mut counterpart_ids: Vec<UserId> =
            connections.iter().map(|c| c.counterpart_of(user_id)).collect();
        counterpart_ids.sort();
        counterpart_ids.dedup();
        let profiles = self.profiles.profiles(&counterpart_ids).await?;

        let list = build_list(user_id, connections, &profiles);
        self.cache.put(user_id, token, list.clone()).await;
        Ok(list)
    }

    /// Delete `id` while it is in `expected` and confirm it is gone, retrying up to
    /// `max_attempts` deletes in total.
    ///
    /// A row found in another status means a concurrent transition won; that is
    /// reported as `InvalidState` rather than retried.
    pub async fn delete_with_verification(
        &self,
        id: ConnectionId,
        expected: ConnectionStatus,
        max_attempts: u32,
    ) -> Result<DeletionOutcome, ConnectionError> {
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.store.delete(id, expected).await?;

            match self.find_by_id(id).await? {
                None => {
                    if attempt > 1 {
                        info!("Connection {} confirmed deleted on attempt {}", id, attempt);
                    }
                    return Ok(DeletionOutcome::Deleted);
                }
                Some(current) if current.status != expected => {
                    return Err(ConnectionError::InvalidState {
                        expected,
                        actual: current.status,
                    });
                }
                Some(_) => {
                    warn!(
                        "Connection {} still present after delete attempt {}/{}",
                        id, attempt, max_attempts
                    );
                    if attempt < max_attempts && !self.retry.backoff.is_zero() {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
            }
        }

        error!("Connection {} still present after {} delete attempts", id, max_attempts);
        Ok(DeletionOutcome::StillPresent)
    }

    async fn delete_verified(
        &self,
        connection: &Connection,
        expected: ConnectionStatus,
    ) -> Result<(), ConnectionError> {
        let outcome = self
            .delete_with_verification(connection.id, expected, self.retry.max_attempts)
            .await;
        // Whatever happened, the cached lists for both parties may now be wrong.
        self.invalidate_parties(connection).await;

        match outcome? {
            DeletionOutcome::Deleted => Ok(()),
            DeletionOutcome::StillPresent => Err(ConnectionError::DeletionFailed {
                id: connection.id,
                attempts: self.retry.max_attempts.max(1),
            }),
        }
    }

    /// Load the connection and check actor and status, in that order.
    async fn authorize(
        &self,
        input: ConnectionActionInput,
        party: Party,
        required: ConnectionStatus,
    ) -> Result<Connection, ConnectionError> {
        let connection = self
            .find_by_id(input.connection_id)
            .await?
            .ok_or(ConnectionError::NotFound(input.connection_id))?;

        if !party.permits(&connection, input.acting_user_id) {
            warn!(
                "User {} denied {:?}-only action on connection {}",
                input.acting_user_id, party, connection.id
            );
            return Err(ConnectionError::Forbidden);
        }

        if connection.status != required {
            return Err(ConnectionError::InvalidState {
                expected: required,
                actual: connection.status,
            });
        }

        Ok(connection)
    }

    /// Explain why a conditional write matched nothing.
    async fn lost_race(&self, id: ConnectionId, expected: ConnectionStatus) -> ConnectionError {
        match self.find_by_id(id).await {
            Ok(None) => ConnectionError::NotFound(id),
            Ok(Some(current)) => ConnectionError::InvalidState {
                expected,
                actual: current.status,
            },
            Err(e) => e,
        }
    }

    async fn find_by_id(&self, id: ConnectionId) -> Result<Option<Connection>, ConnectionError> {
        Ok(self
            .store
            .find(ConnectionFilter::ById(id))
            .await?
            .into_iter()
            .next())
    }

    async fn live_between(&self, a: UserId, b: UserId) -> Result<Option<Connection>, ConnectionError> {
        Ok(self
            .store
            .find(ConnectionFilter::Between(a, b))
            .await?
            .into_iter()
            .find(|c| c.status.is_live()))
    }

    async fn invalidate_parties(&self, connection: &Connection) {
        self.cache.invalidate(connection.requester_id).await;
        self.cache.invalidate(connection.recipient_id).await;
    }

    async fn display_name(&self, user_id: UserId) -> String {
        match self.profiles.profiles(&[user_id]).await {
            Ok(mut found) => found
                .remove(&user_id)
                .map(|p| p.full_name)
                .unwrap_or_else(|| UNKNOWN_USER_NAME.to_string()),
            Err(e) => {
                warn!("Could not load profile {} for notification: {}", user_id, e);
                UNKNOWN_USER_NAME.to_string()
            }
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(
                "Dropped {} notification for {}: {}",
                notification.category, notification.user_id, e
            );
        }
    }
}

fn duplicate_kind(status: ConnectionStatus) -> DuplicateKind {
    match status {
        ConnectionStatus::Accepted => DuplicateKind::AlreadyConnected,
        _ => DuplicateKind::AlreadyPending,
    }
}

fn build_list(
    user_id: UserId,
    connections: Vec<Connection>,
    profiles: &HashMap<UserId, Profile>,
) -> ConnectionList {
    let mut list = ConnectionList::default();

    for connection in connections {
        let counterpart_id = connection.counterpart_of(user_id);
        let entry = ConnectionEntry {
            id: connection.id,
            status: connection.status,
            is_outgoing: connection.requester_id == user_id,
            counterpart: profiles
                .get(&counterpart_id)
                .cloned()
                .unwrap_or_else(|| Profile::unknown(counterpart_id)),
            created_at: connection.created_at,
            updated_at: connection.updated_at,
        };

        match connection.status {
            ConnectionStatus::Accepted => list.accepted.push(entry),
            ConnectionStatus::Pending => list.pending.push(entry),
            ConnectionStatus::Declined => {}
        }
    }

    let newest_first =
        |a: &ConnectionEntry, b: &ConnectionEntry| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id));
    list.accepted.sort_by(newest_first);
    list.pending.sort_by(newest_first);
    list
}
