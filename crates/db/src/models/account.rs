use serde::Serialize;
use sqlx::FromRow;
use hypertext_core::types::{DbId, Timestamp};

/// A row from the `accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: DbId,
    pub uid: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
