use async_trait::async_trait;
use sqlx::PgPool;

use super::ports::ConnectionStore;
use crate::error::StoreError;
use crate::models::{
    Connection, ConnectionFilter, ConnectionId, ConnectionRow, ConnectionStatus, NewConnection,
};

const CONNECTION_COLUMNS: &str =
    "id, requester_id, recipient_id, status, created_at, updated_at";

fn into_connection(row: ConnectionRow) -> Result<Connection, StoreError> {
    Connection::try_from(row).map_err(StoreError::Malformed)
}

fn into_connections(rows: Vec<ConnectionRow>) -> Result<Vec<Connection>, StoreError> {
    rows.into_iter().map(into_connection).collect()
}

pub async fn find_connections(
    pool: &PgPool,
    filter: ConnectionFilter,
) -> Result<Vec<Connection>, StoreError> {
    let rows = match filter {
        ConnectionFilter::ById(id) => {
            sqlx::query_as::<_, ConnectionRow>(&format!(
                "SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = $1"
            ))
            .bind(id)
            .fetch_all(pool)
            .await?
        }
        ConnectionFilter::Between(a, b) => {
            sqlx::query_as::<_, ConnectionRow>(&format!(
                r#"
                SELECT {CONNECTION_COLUMNS}
                FROM connections
                WHERE (requester_id = $1 AND recipient_id = $2)
                   OR (requester_id = $2 AND recipient_id = $1)
                ORDER BY updated_at DESC
                "#
            ))
            .bind(a)
            .bind(b)
            .fetch_all(pool)
            .await?
        }
        ConnectionFilter::Involving(user_id) => {
            sqlx::query_as::<_, ConnectionRow>(&format!(
                r#"
                SELECT {CONNECTION_COLUMNS}
                FROM connections
                WHERE requester_id = $1 OR recipient_id = $1
                ORDER BY updated_at DESC
                "#
            ))
            .bind(user_id)
            .fetch_all(pool)
            .await?
        }
    };

    into_connections(rows)
}

pub async fn insert_connection(pool: &PgPool, new: &NewConnection) -> Result<Connection, StoreError> {
    let row = sqlx::query_as::<_, ConnectionRow>(&format!(
        r#"
        INSERT INTO connections (requester_id, recipient_id, status)
        VALUES ($1, $2, 'pending')
        RETURNING {CONNECTION_COLUMNS}
        "#
    ))
    .bind(new.requester_id)
    .bind(new.recipient_id)
    .fetch_one(pool)
    .await?;

    into_connection(row)
}

pub async fn update_connection_status(
    pool: &PgPool,
    id: ConnectionId,
    from: ConnectionStatus,
    to: ConnectionStatus,
) -> Result<Option<Connection>, StoreError> {
    let row = sqlx::query_as::<_, ConnectionRow>(&format!(
        r#"
        UPDATE connections
        SET status = $3, updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING {CONNECTION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(from.as_str())
    .bind(to.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(into_connection).transpose()
}

pub async fn delete_connection(
    pool: &PgPool,
    id: ConnectionId,
    expected: ConnectionStatus,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        DELETE FROM connections
        WHERE id = $1 AND status = $2
        "#,
    )
    .bind(id)
    .bind(expected.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Count legacy rows left behind when rejection used to be a status write.
pub async fn count_declined_connections(pool: &PgPool) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM connections WHERE status = 'declined'",
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn delete_declined_connections(pool: &PgPool) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM connections WHERE status = 'declined'")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[derive(Debug, Clone)]
pub struct PgConnectionStore {
    pool: PgPool,
}

impl PgConnectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionStore for PgConnectionStore {
    async fn find(&self, filter: ConnectionFilter) -> Result<Vec<Connection>, StoreError> {
        find_connections(&self.pool, filter).await
    }

    async fn insert(&self, new: NewConnection) -> Result<Connection, StoreError> {
        insert_connection(&self.pool, &new).await
    }

    async fn update_status(
        &self,
        id: ConnectionId,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> Result<Option<Connection>, StoreError> {
        update_connection_status(&self.pool, id, from, to).await
    }

    async fn delete(&self, id: ConnectionId, expected: ConnectionStatus) -> Result<(), StoreError> {
        let deleted = delete_connection(&self.pool, id, expected).await?;
        if deleted == 0 {
            tracing::debug!("Delete of connection {} matched no {} row", id, expected);
        }
        Ok(())
    }
}
