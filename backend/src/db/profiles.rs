use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;

use super::ports::ProfileDirectory;
use crate::error::StoreError;
use crate::models::{Profile, UserId};

/// Fetch display profiles for a set of users. Missing users are simply absent from the result.
pub async fn get_profiles_by_ids(pool: &PgPool, ids: &[UserId]) -> Result<Vec<Profile>, StoreError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let profiles = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, full_name, avatar_url, occupation
        FROM profiles
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(profiles)
}

#[derive(Debug, Clone)]
pub struct PgProfileDirectory {
    pool: PgPool,
}

impl PgProfileDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileDirectory for PgProfileDirectory {
    async fn profiles(&self, ids: &[UserId]) -> Result<HashMap<UserId, Profile>, StoreError> {
        let profiles = get_profiles_by_ids(&self.pool, ids).await?;
        Ok(profiles.into_iter().map(|p| (p.id, p)).collect())
    }
}
