use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    ConnectionRequest,
    ConnectionAccepted,
    ConnectionCancelled,
    ConnectionRejected,
    ConnectionRemoved,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionRequest => "connection_request",
            Self::ConnectionAccepted => "connection_accepted",
            Self::ConnectionCancelled => "connection_cancelled",
            Self::ConnectionRejected => "connection_rejected",
            Self::ConnectionRemoved => "connection_removed",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub link: String,
}
