use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub occupation: Option<String>,
}

impl Profile {
    /// Stand-in used when a user has no profile row yet.
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            full_name: crate::constants::UNKNOWN_USER_NAME.to_string(),
            avatar_url: None,
            occupation: None,
        }
    }
}
