use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::profiles::Profile;

pub type UserId = Uuid;
pub type ConnectionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    /// Only found on legacy rows. Never written by the manager and never blocks a new request.
    Declined,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    /// Pending and accepted rows count towards the one-per-pair limit.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Declined)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(format!("unknown connection status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub requester_id: UserId,
    pub recipient_id: UserId,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn involves(&self, user_id: UserId) -> bool {
        self.requester_id == user_id || self.recipient_id == user_id
    }

    /// The party on the other side from `user_id`.
    pub fn counterpart_of(&self, user_id: UserId) -> UserId {
        if self.requester_id == user_id {
            self.recipient_id
        } else {
            self.requester_id
        }
    }

    pub fn connects(&self, a: UserId, b: UserId) -> bool {
        (self.requester_id == a && self.recipient_id == b)
            || (self.requester_id == b && self.recipient_id == a)
    }
}

/// Raw `connections` row. Status is stored as text and checked on the way out.
#[derive(Debug, Clone, FromRow)]
pub struct ConnectionRow {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ConnectionRow> for Connection {
    type Error = String;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            requester_id: row.requester_id,
            recipient_id: row.recipient_id,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnection {
    pub requester_id: UserId,
    pub recipient_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFilter {
    ById(ConnectionId),
    /// `requester = a AND recipient = b` OR `requester = b AND recipient = a`
    Between(UserId, UserId),
    /// `requester = u OR recipient = u`
    Involving(UserId),
}

impl ConnectionFilter {
    pub fn matches(&self, connection: &Connection) -> bool {
        match *self {
            Self::ById(id) => connection.id == id,
            Self::Between(a, b) => connection.connects(a, b),
            Self::Involving(user_id) => connection.involves(user_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One row-level change as published on the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionChange {
    pub op: ChangeOp,
    pub id: ConnectionId,
    pub requester_id: UserId,
    pub recipient_id: UserId,
}

impl ConnectionChange {
    pub fn of(op: ChangeOp, connection: &Connection) -> Self {
        Self {
            op,
            id: connection.id,
            requester_id: connection.requester_id,
            recipient_id: connection.recipient_id,
        }
    }
}

/// What subscribers of the change feed receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Changed(ConnectionChange),
    /// The feed may have missed changes (e.g. its connection dropped). Treat everything as stale.
    Reset,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SendRequestInput {
    pub requester_id: UserId,
    pub recipient_id: UserId,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConnectionActionInput {
    pub connection_id: ConnectionId,
    pub acting_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionEntry {
    pub id: ConnectionId,
    pub status: ConnectionStatus,
    pub is_outgoing: bool,
    pub counterpart: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionList {
    pub accepted: Vec<ConnectionEntry>,
    pub pending: Vec<ConnectionEntry>,
}

impl ConnectionList {
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.accepted.iter().chain(self.pending.iter()).any(|entry| entry.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(requester_id: UserId, recipient_id: UserId) -> Connection {
        let now = Utc::now();
        Connection {
            id: Uuid::new_v4(),
            requester_id,
            recipient_id,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_parses_stored_text() {
        assert_eq!("pending".parse::<ConnectionStatus>(), Ok(ConnectionStatus::Pending));
        assert_eq!("accepted".parse::<ConnectionStatus>(), Ok(ConnectionStatus::Accepted));
        assert_eq!("declined".parse::<ConnectionStatus>(), Ok(ConnectionStatus::Declined));
        assert!("cancelled".parse::<ConnectionStatus>().is_err());
    }

    #[test]
    fn test_declined_is_not_live() {
        assert!(ConnectionStatus::Pending.is_live());
        assert!(ConnectionStatus::Accepted.is_live());
        assert!(!ConnectionStatus::Declined.is_live());
    }

    #[test]
    fn test_between_filter_ignores_direction() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let conn = connection(a, b);

        assert!(ConnectionFilter::Between(a, b).matches(&conn));
        assert!(ConnectionFilter::Between(b, a).matches(&conn));
        assert!(!ConnectionFilter::Between(a, c).matches(&conn));
        assert!(ConnectionFilter::Involving(b).matches(&conn));
        assert!(!ConnectionFilter::Involving(c).matches(&conn));
    }

    #[test]
    fn test_counterpart() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conn = connection(a, b);
        assert_eq!(conn.counterpart_of(a), b);
        assert_eq!(conn.counterpart_of(b), a);
    }
}
