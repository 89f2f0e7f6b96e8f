use std::sync::atomic::Ordering;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use parley_types::models::{Message, User};

use crate::models::{MessageRow, UserRow};
use crate::{Database, MessageStore, Result, StoreError};

pub const MAX_USERNAME_CHARS: usize = 64;

impl Database {
    /// Next message timestamp in microseconds. Never goes backwards, even if
    /// the wall clock does. Must be called with the connection lock held.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let prev = self.clock.fetch_max(now, Ordering::SeqCst);
        now.max(prev)
    }
}

impl MessageStore for Database {
    // -- Users --

    fn create_or_get_user(&self, username: &str) -> Result<User> {
        validate_username(username)?;

        self.with_conn(|conn| {
            // The UNIQUE constraint serializes concurrent registrations
            let inserted = conn.execute(
                "INSERT INTO users (username) VALUES (?1) ON CONFLICT(username) DO NOTHING",
                [username],
            )?;

            let user = query_user_by_username(conn, username)?.ok_or_else(|| {
                StoreError::Persistence(format!("user '{}' vanished after insert", username))
            })?;

            if inserted > 0 {
                info!("Registered user {} ({})", user.username, user.id);
            }
            Ok(user)
        })
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, username FROM users ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(User::from).collect())
        })
    }

    // -- Messages --

    fn record_message(&self, sender_id: i64, receiver_id: i64, content: &str) -> Result<Message> {
        if content.is_empty() {
            return Err(StoreError::Validation("message content must not be empty".into()));
        }

        self.with_conn(|conn| {
            for id in [sender_id, receiver_id] {
                if query_user_by_id(conn, id)?.is_none() {
                    return Err(StoreError::NotFound(format!("user {}", id)));
                }
            }

            let created_at = self.next_timestamp();
            conn.execute(
                "INSERT INTO messages (sender_id, receiver_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![sender_id, receiver_id, content, created_at],
            )?;

            let row = MessageRow {
                id: conn.last_insert_rowid(),
                sender_id,
                receiver_id,
                content: content.to_string(),
                created_at,
            };
            debug!("Stored message {} ({} -> {})", row.id, sender_id, receiver_id);
            Message::try_from(row)
        })
    }

    fn get_conversation(&self, user_a: i64, user_b: i64) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_conversation(conn, user_a, user_b))
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(StoreError::Validation("username must not be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(StoreError::Validation(format!(
            "username must be at most {} characters",
            MAX_USERNAME_CHARS
        )));
    }
    Ok(())
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare("SELECT id, username FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })
        .optional()?;

    Ok(row.map(User::from))
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    let mut stmt = conn.prepare("SELECT id, username FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })
        .optional()?;

    Ok(row.map(User::from))
}

fn query_conversation(conn: &Connection, user_a: i64, user_b: i64) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_id, receiver_id, content, created_at
         FROM messages
         WHERE (sender_id = ?1 AND receiver_id = ?2)
            OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![user_a, user_b], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(Message::try_from).collect()
}
