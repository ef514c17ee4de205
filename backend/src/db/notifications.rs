use async_trait::async_trait;
use sqlx::PgPool;

use super::ports::NotificationSink;
use crate::error::NotifyError;
use crate::models::Notification;

pub async fn create_notification(pool: &PgPool, notification: &Notification) -> Result<(), NotifyError> {
    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, type, title, message, link)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.category.as_str())
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(&notification.link)
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        create_notification(&self.pool, notification).await
    }
}
