//! User-facing texts for connection lifecycle notifications.

use crate::constants::{CONNECTIONS_LINK, PROFILE_LINK_PREFIX, REQUESTS_LINK};
use crate::models::{Connection, Notification, NotificationCategory};

/// Builds notifications with deep links rooted at `base_path`.
#[derive(Debug, Clone, Default)]
pub struct Notices {
    base_path: String,
}

impl Notices {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into().trim_end_matches('/').to_string(),
        }
    }

    fn link(&self, path: &str) -> String {
        format!("{}{}", self.base_path, path)
    }

    pub fn request_sent(&self, connection: &Connection, requester_name: &str) -> Notification {
        Notification {
            user_id: connection.recipient_id,
            category: NotificationCategory::ConnectionRequest,
            title: "New connection request".to_string(),
            body: format!("{} wants to connect with you", requester_name),
            link: self.link(REQUESTS_LINK),
        }
    }

    pub fn request_accepted(&self, connection: &Connection, recipient_name: &str) -> Notification {
        Notification {
            user_id: connection.requester_id,
            category: NotificationCategory::ConnectionAccepted,
            title: "Connection request accepted".to_string(),
            body: format!("{} accepted your connection request", recipient_name),
            link: self.link(&format!("{}{}", PROFILE_LINK_PREFIX, connection.recipient_id)),
        }
    }

    pub fn request_declined(&self, connection: &Connection, recipient_name: &str) -> Notification {
        Notification {
            user_id: connection.requester_id,
            category: NotificationCategory::ConnectionRejected,
            title: "Connection request declined".to_string(),
            body: format!("{} declined your connection request", recipient_name),
            link: self.link(CONNECTIONS_LINK),
        }
    }

    pub fn request_cancelled(&self, connection: &Connection, requester_name: &str) -> Notification {
        Notification {
            user_id: connection.recipient_id,
            category: NotificationCategory::ConnectionCancelled,
            title: "Connection request cancelled".to_string(),
            body: format!("{} cancelled their connection request", requester_name),
            link: self.link(CONNECTIONS_LINK),
        }
    }

    /// `remover_id` must be one of the two parties; the other one is notified.
    pub fn connection_removed(
        &self,
        connection: &Connection,
        remover_id: uuid::Uuid,
        remover_name: &str,
    ) -> Notification {
        Notification {
            user_id: connection.counterpart_of(remover_id),
            category: NotificationCategory::ConnectionRemoved,
            title: "Connection removed".to_string(),
            body: format!("{} removed you from their connections", remover_name),
            link: self.link(CONNECTIONS_LINK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn connection() -> Connection {
        let now = Utc::now();
        Connection {
            id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_links_use_base_path() {
        let notices = Notices::new("/app/");
        let conn = connection();
        let notice = notices.request_sent(&conn, "Ada");
        assert_eq!(notice.link, "/app/connections?tab=requests");
        assert_eq!(notice.user_id, conn.recipient_id);
    }

    #[test]
    fn test_accepted_links_to_recipient_profile() {
        let notices = Notices::default();
        let conn = connection();
        let notice = notices.request_accepted(&conn, "Grace");
        assert_eq!(notice.user_id, conn.requester_id);
        assert_eq!(notice.link, format!("/profile/{}", conn.recipient_id));
    }

    #[test]
    fn test_removal_goes_to_other_party() {
        let notices = Notices::default();
        let conn = connection();
        assert_eq!(
            notices.connection_removed(&conn, conn.recipient_id, "Bo").user_id,
            conn.requester_id
        );
        assert_eq!(
            notices.connection_removed(&conn, conn.requester_id, "Al").user_id,
            conn.recipient_id
        );
    }
}
