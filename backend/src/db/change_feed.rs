use anyhow::Result;
use sqlx::{PgPool, postgres::PgListener};
use std::time::Duration;
use tokio::sync::broadcast;

use super::ports::ChangeFeed;
use crate::constants::{CHANGE_FEED_CAPACITY, CHANGE_FEED_RECONNECT_SECS, CONNECTION_CHANGES_CHANNEL};
use crate::models::{ConnectionChange, FeedEvent};

/// Relays `pg_notify` events from the connections trigger to in-process subscribers.
#[derive(Debug, Clone)]
pub struct PgChangeFeed {
    sender: broadcast::Sender<FeedEvent>,
}

impl PgChangeFeed {
    /// Start listening in the background. The task reconnects on its own when the
    /// LISTEN connection drops, and publishes `FeedEvent::Reset` every time it
    /// (re)subscribes since notifications sent in between are lost.
    pub fn spawn(pool: PgPool) -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let feed = Self { sender };

        let relay = feed.sender.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = listen(&pool, &relay).await {
                    tracing::warn!(
                        "Change feed listener dropped: {}, reconnecting in {}s",
                        e,
                        CHANGE_FEED_RECONNECT_SECS
                    );
                }
                tokio::time::sleep(Duration::from_secs(CHANGE_FEED_RECONNECT_SECS)).await;
            }
        });

        feed
    }
}

impl ChangeFeed for PgChangeFeed {
    fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }
}

async fn listen(pool: &PgPool, relay: &broadcast::Sender<FeedEvent>) -> Result<()> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CONNECTION_CHANGES_CHANNEL).await?;
    tracing::info!("Listening for connection changes on '{}'", CONNECTION_CHANGES_CHANNEL);
    // No subscribers is fine; nothing to invalidate.
    let _ = relay.send(FeedEvent::Reset);

    loop {
        // `None` means the connection was lost. The next call reconnects and re-issues LISTEN.
        let Some(notification) = listener.try_recv().await? else {
            tracing::warn!("Change feed connection lost, resubscribing");
            let _ = relay.send(FeedEvent::Reset);
            continue;
        };

        match parse_change(notification.payload()) {
            Ok(change) => {
                let _ = relay.send(FeedEvent::Changed(change));
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed change payload '{}': {}", notification.payload(), e);
            }
        }
    }
}

fn parse_change(payload: &str) -> serde_json::Result<ConnectionChange> {
    serde_json::from_str(payload)
}
