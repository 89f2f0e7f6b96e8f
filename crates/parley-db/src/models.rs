//! Database row types. These map directly to SQLite rows.
//! Distinct from parley-types models to keep the DB layer independent.

use chrono::DateTime;

use parley_types::models::{Message, User};

use crate::StoreError;

pub struct UserRow {
    pub id: i64,
    pub username: String,
}

pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub created_at: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
        }
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, StoreError> {
        let timestamp = DateTime::from_timestamp_micros(row.created_at).ok_or_else(|| {
            StoreError::Persistence(format!(
                "corrupt created_at {} on message {}",
                row.created_at, row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            content: row.content,
            timestamp,
        })
    }
}
